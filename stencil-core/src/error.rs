// Error types for the Stencil engine

use crate::HttpResponse;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error(transparent)]
    Binding(#[from] BindError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RouteNotFound(_) => 404,
            Error::MethodNotAllowed(_) => 405,
            Error::Deserialization(_) => 400,
            _ => 500,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Render the error as a JSON response
    pub fn to_response(&self) -> HttpResponse {
        error_response(self.status_code(), &self.to_string())
    }
}

/// `{"error": message, "status": status}` with the given status
pub(crate) fn error_response(status: u16, message: &str) -> HttpResponse {
    let body = serde_json::json!({
        "error": message,
        "status": status,
    });
    HttpResponse::new(status)
        .with_json(&body)
        .unwrap_or_else(|_| HttpResponse::new(status))
}

/// A request value that could not be decoded into its parameter's type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot bind parameter `{param}` of type `{type_name}`: {message}")]
pub struct BindError {
    pub param: String,
    pub type_name: String,
    pub message: String,
}

impl BindError {
    pub fn new(
        param: impl Into<String>,
        type_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            param: param.into(),
            type_name: type_name.into(),
            message: message.into(),
        }
    }
}

/// Reasons a registered service module is left out of the catalog
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("metadata for `{service}` could not be loaded: {reason}")]
    MetadataUnavailable { service: String, reason: String },

    #[error("`{operation}` declares unknown HTTP method `{method}`")]
    UnknownMethod { operation: String, method: String },

    #[error("`{operation}` declares parameter `{param}` more than once")]
    DuplicateParameter { operation: String, param: String },

    #[error("route `{route}` of `{operation}` is malformed: {reason}")]
    MalformedRoute {
        operation: String,
        route: String,
        reason: String,
    },

    #[error("route `{route}` of `{operation}` has placeholder `{{{placeholder}}}` with no simple parameter")]
    UnboundPlaceholder {
        operation: String,
        route: String,
        placeholder: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::RouteNotFound("/x".into()).status_code(), 404);
        assert_eq!(Error::MethodNotAllowed("GET /x".into()).status_code(), 405);
        assert_eq!(Error::Deserialization("bad".into()).status_code(), 400);
        assert!(Error::Deserialization("bad".into()).is_client_error());
        assert_eq!(Error::ProviderNotFound("Svc".into()).status_code(), 500);
        assert!(Error::ProviderNotFound("Svc".into()).is_server_error());
    }

    #[test]
    fn test_bind_error_message_names_parameter_and_type() {
        let err = BindError::new("id", "i32", "invalid digit found in string");
        let message = err.to_string();
        assert!(message.contains("`id`"));
        assert!(message.contains("`i32`"));
        assert_eq!(Error::from(err).status_code(), 500);
    }

    #[test]
    fn test_error_response_body() {
        let response = Error::RouteNotFound("GET /nowhere".into()).to_response();
        assert_eq!(response.status, 404);
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["status"], 404);
        assert!(body["error"].as_str().unwrap().contains("/nowhere"));
    }
}
