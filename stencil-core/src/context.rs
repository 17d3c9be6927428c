//! Runtime handles injected into operations.
//!
//! Parameters of type [`HttpRequest`], [`RequestContext`], [`ResponseHandle`]
//! or [`CancellationToken`] are never read from the payload. The dispatcher
//! builds one [`RequestContext`] per request and every injected parameter is
//! cut from it.

use crate::{HttpMethod, HttpRequest, HttpResponse};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-request state shared by the injected handles
#[derive(Clone, Debug)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    request: HttpRequest,
    route: String,
    method: HttpMethod,
    response: ResponseHandle,
    cancellation: CancellationToken,
}

impl RequestContext {
    pub fn new(
        request: HttpRequest,
        route: impl Into<String>,
        method: HttpMethod,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                request,
                route: route.into(),
                method,
                response: ResponseHandle::default(),
                cancellation,
            }),
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.inner.request
    }

    /// Route template of the endpoint serving this request
    pub fn route(&self) -> &str {
        &self.inner.route
    }

    pub fn method(&self) -> HttpMethod {
        self.inner.method
    }

    pub fn response(&self) -> &ResponseHandle {
        &self.inner.response
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.inner.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellation.is_cancelled()
    }
}

/// Status and headers an operation wants on its successful response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseParts {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
}

/// Writable view of the response an operation is about to produce.
///
/// Changes are applied to generated success responses only; an operation
/// that returns its own [`HttpResponse`] controls every part of it.
#[derive(Debug, Clone, Default)]
pub struct ResponseHandle {
    parts: Arc<Mutex<ResponseParts>>,
}

impl ResponseHandle {
    pub fn set_status(&self, status: u16) {
        self.parts.lock().status = Some(status);
    }

    pub fn insert_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.parts.lock().headers.push((name.into(), value.into()));
    }

    pub fn snapshot(&self) -> ResponseParts {
        self.parts.lock().clone()
    }

    pub(crate) fn apply(&self, mut response: HttpResponse) -> HttpResponse {
        let parts = self.snapshot();
        if let Some(status) = parts.status {
            response.status = status;
        }
        for (name, value) in parts.headers {
            response.headers.insert(name, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_handle_is_shared_between_clones() {
        let context = RequestContext::new(
            HttpRequest::new("GET", "/"),
            "/",
            HttpMethod::GET,
            CancellationToken::new(),
        );
        let handle = context.response().clone();
        handle.set_status(202);
        handle.insert_header("X-Trace", "abc");

        let parts = context.response().snapshot();
        assert_eq!(parts.status, Some(202));
        assert_eq!(parts.headers, vec![("X-Trace".to_string(), "abc".to_string())]);
    }

    #[test]
    fn test_apply_overrides_status_and_headers() {
        let handle = ResponseHandle::default();
        handle.set_status(201);
        handle.insert_header("Location", "/users/1");
        let response = handle.apply(HttpResponse::ok());
        assert_eq!(response.status, 201);
        assert_eq!(response.header("location"), Some("/users/1"));
    }

    #[test]
    fn test_cancellation_is_visible() {
        let token = CancellationToken::new();
        let context = RequestContext::new(
            HttpRequest::new("GET", "/"),
            "/",
            HttpMethod::GET,
            token.clone(),
        );
        assert!(!context.is_cancelled());
        token.cancel();
        assert!(context.is_cancelled());
    }
}
