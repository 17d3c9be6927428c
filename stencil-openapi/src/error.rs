use thiserror::Error;

/// Errors raised while rendering an OpenAPI document
#[derive(Error, Debug)]
pub enum OpenApiError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl OpenApiError {
    /// Status code when a rendering failure reaches an HTTP response
    pub fn status_code(&self) -> u16 {
        500
    }
}
