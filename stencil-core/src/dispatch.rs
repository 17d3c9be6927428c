//! Request dispatch.
//!
//! For one matched endpoint: resolve the service instance, bind arguments,
//! validate, invoke, and turn the [`Outcome`] into a response. Every failure
//! of a single request ends as an error response; none escapes the dispatcher.

use crate::binding::Rejection;
use crate::catalog::{panic_message, EndpointDescriptor};
use crate::config::MissingParamPolicy;
use crate::container::ServiceResolver;
use crate::context::{RequestContext, ResponseHandle};
use crate::error::error_response;
use crate::logging::{debug, error};
use crate::metadata::Arguments;
use crate::pipeline::ValidationPipeline;
use crate::{Error, HttpResponse};
use futures_util::FutureExt;
use serde::Serialize;
use std::fmt::{self, Display};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use stencil_validation::{ValidationError, ValidationErrors};

/// A successful operation result
#[derive(Debug)]
pub enum Reply {
    /// Unit return
    Empty,
    /// A response built by the operation itself, passed through untouched
    Response(HttpResponse),
    /// A serialized return value
    Json(Vec<u8>),
}

/// What became of one request
#[derive(Debug)]
pub enum Outcome {
    Success(Reply),
    ValidationFailed(Vec<ValidationError>),
    Faulted(String),
}

impl Outcome {
    pub fn empty() -> Self {
        Outcome::Success(Reply::Empty)
    }

    pub fn response(response: HttpResponse) -> Self {
        Outcome::Success(Reply::Response(response))
    }

    /// Serialize a return value; a serialization failure is a fault
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Outcome::Success(Reply::Json(body)),
            Err(e) => Outcome::Faulted(format!("failed to serialize result: {}", e)),
        }
    }

    pub fn faulted(message: impl Display) -> Self {
        Outcome::Faulted(message.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Render the HTTP response; status and headers set through the
    /// [`ResponseHandle`] apply to generated success responses only
    pub fn into_response(self, handle: &ResponseHandle) -> HttpResponse {
        match self {
            Outcome::Success(Reply::Empty) => handle.apply(HttpResponse::ok()),
            Outcome::Success(Reply::Json(body)) => handle.apply(
                HttpResponse::ok()
                    .with_header("Content-Type", "application/json")
                    .with_body(body),
            ),
            Outcome::Success(Reply::Response(response)) => response,
            Outcome::ValidationFailed(errors) => {
                let body = ValidationErrors::new(errors).to_json();
                HttpResponse::bad_request()
                    .with_json(&body)
                    .unwrap_or_else(|_| HttpResponse::bad_request())
            }
            Outcome::Faulted(message) => error_response(500, &message),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success(_) => f.write_str("success"),
            Outcome::ValidationFailed(errors) => write!(f, "{} validation error(s)", errors.len()),
            Outcome::Faulted(message) => write!(f, "fault: {}", message),
        }
    }
}

/// Runs matched endpoints
#[derive(Clone)]
pub struct Dispatcher {
    resolver: Arc<dyn ServiceResolver>,
    validation: ValidationPipeline,
    missing_params: MissingParamPolicy,
}

impl Dispatcher {
    pub fn new(
        resolver: Arc<dyn ServiceResolver>,
        validation: ValidationPipeline,
        missing_params: MissingParamPolicy,
    ) -> Self {
        Self {
            resolver,
            validation,
            missing_params,
        }
    }

    /// Resolve, bind, validate and invoke; panics become faults
    pub async fn execute(&self, endpoint: &EndpointDescriptor, context: &RequestContext) -> Outcome {
        match AssertUnwindSafe(self.run(endpoint, context))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => Outcome::Faulted(panic_message(payload.as_ref())),
        }
    }

    /// [`execute`](Self::execute) and render the response
    pub async fn dispatch(&self, endpoint: &EndpointDescriptor, context: &RequestContext) -> HttpResponse {
        let operation = endpoint.operation();
        let outcome = self.execute(endpoint, context).await;

        match &outcome {
            Outcome::Success(_) => debug!(
                operation = operation.name(),
                route = endpoint.route(),
                "Operation completed"
            ),
            Outcome::ValidationFailed(errors) => debug!(
                operation = operation.name(),
                errors = errors.len(),
                "Request rejected by validation"
            ),
            Outcome::Faulted(message) => error!(
                service = operation.service_name(),
                operation = operation.name(),
                error = %message,
                "Operation faulted"
            ),
        }

        outcome.into_response(context.response())
    }

    async fn run(&self, endpoint: &EndpointDescriptor, context: &RequestContext) -> Outcome {
        let operation = endpoint.operation();

        let Some(instance) = self
            .resolver
            .resolve(operation.service_type(), operation.service_name())
            .await
        else {
            return Outcome::Faulted(format!(
                "no instance of `{}` could be resolved",
                operation.service_name()
            ));
        };

        let args = match endpoint.plan().bind(context, self.missing_params) {
            Ok(args) => args,
            Err(Rejection::Invalid(e)) => return Outcome::faulted(Error::from(e)),
            Err(Rejection::Missing(errors)) => return Outcome::ValidationFailed(errors),
        };

        let errors = self.validation.validate(endpoint.plan(), &args);
        if !errors.is_empty() {
            return Outcome::ValidationFailed(errors);
        }

        (operation.meta().invoke)(instance, Arguments::new(args)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_replies() {
        let handle = ResponseHandle::default();
        assert_eq!(Outcome::empty().into_response(&handle).status, 200);

        let response = Outcome::json(&vec![1, 2]).into_response(&handle);
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"[1,2]");
        assert_eq!(response.header("content-type"), Some("application/json"));
    }

    #[test]
    fn test_response_handle_applies_to_generated_responses_only() {
        let handle = ResponseHandle::default();
        handle.set_status(201);

        assert_eq!(Outcome::empty().into_response(&handle).status, 201);
        let passthrough = Outcome::response(HttpResponse::new(418)).into_response(&handle);
        assert_eq!(passthrough.status, 418);
    }

    #[test]
    fn test_failure_bodies() {
        let handle = ResponseHandle::default();

        let invalid = Outcome::ValidationFailed(vec![
            ValidationError::new("name", "name is required").with_constraint("required"),
        ])
        .into_response(&handle);
        assert_eq!(invalid.status, 400);
        let body: serde_json::Value = invalid.json().unwrap();
        assert_eq!(body["errors"][0]["field"], "name");

        let faulted = Outcome::faulted("boom").into_response(&handle);
        assert_eq!(faulted.status, 500);
        let body: serde_json::Value = faulted.json().unwrap();
        assert_eq!(body, serde_json::json!({"error": "boom", "status": 500}));
    }
}
