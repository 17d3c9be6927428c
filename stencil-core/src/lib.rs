//! Convention-based endpoint synthesis and request dispatch.
//!
//! Service modules annotated with `#[service]` are scanned once at startup.
//! Every public `&self` method becomes an endpoint whose verb and route are
//! inferred from its name and parameter shape, and whose parameters are bound
//! from the path, the query string, the body or the runtime context according
//! to a plan computed at the same time. At request time the [`Dispatcher`]
//! resolves the service, binds, validates, invokes and renders the result.
//!
//! ```no_run
//! use stencil_core::{Application, EngineConfig};
//!
//! # async fn run() -> Result<(), stencil_core::Error> {
//! let config = EngineConfig::from_env()?;
//! let _guard = config.log_config().init();
//!
//! Application::builder()
//!     .config(config)
//!     .discover()
//!     .build()
//!     .listen()
//!     .await
//! # }
//! ```

pub mod application;
pub mod binding;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod container;
pub mod context;
pub mod decode;
pub mod dispatch;
pub mod error;
pub mod form;
pub mod http;
pub mod inference;
pub mod logging;
pub mod metadata;
pub mod pipeline;
pub mod routing;

pub use application::*;
pub use binding::{BindingPlan, BindingSource, PlanEntry, Rejection};
pub use catalog::*;
pub use classify::*;
pub use config::*;
pub use container::*;
pub use context::*;
pub use dispatch::*;
pub use error::*;
pub use http::*;
pub use metadata::*;
pub use pipeline::*;
pub use routing::{Route, RouteMatch, Router};
pub use tokio_util::sync::CancellationToken;

// Used by generated code
pub use inventory;
pub use stencil_validation as validation;
