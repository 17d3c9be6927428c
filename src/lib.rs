// Stencil - convention-based endpoint synthesis for Rust service modules
//
// Annotate an inherent impl block with `#[service]` and its public `&self`
// methods become HTTP endpoints: routes and verbs are inferred from method
// names and parameter shapes, arguments are bound from the path, query or
// body, and results are mapped to responses.
//
// Code generated by the macros refers to `stencil_core`, so crates using
// them depend on `stencil-core` alongside this facade.

// Re-export core functionality
pub use stencil_core::*;

// Re-export procedural macros
pub use stencil_macros::{Structured, service};

pub use async_trait::async_trait;

// Re-export optional crates
#[cfg(feature = "openapi")]
pub use stencil_openapi;

/// Prelude for common imports
pub mod prelude {
    pub use stencil_core::{
        Application, ApplicationBuilder, CancellationToken, Container, EngineConfig,
        HttpMethod, HttpRequest, HttpResponse, Json, MissingParamPolicy, RequestContext,
        ResponseHandle, RouteStyle,
    };
    pub use stencil_core::validation::{Validate, ValidationError};
    pub use stencil_macros::{Structured, service};
}
