//! OpenAPI 3.0 documents synthesized from a Stencil endpoint catalog.
//!
//! The synthesizer reads the catalog the engine already built: route
//! templates, verbs, tags and each endpoint's binding plan. Path and query
//! parameters, flattened query keys of structured GET inputs and request
//! bodies come straight from the plan, so the document always agrees with
//! how requests are actually bound.
//!
//! ```
//! use stencil_openapi::OpenApiBuilder;
//! use stencil_core::EndpointCatalog;
//!
//! let catalog = EndpointCatalog::default();
//! let spec = OpenApiBuilder::new("My API", "1.0.0")
//!     .description("Synthesized endpoints")
//!     .catalog(&catalog)
//!     .build();
//!
//! assert_eq!(spec.info.title, "My API");
//! assert!(spec.paths.is_empty());
//! ```
//!
//! Component schemas are deduplicated through a [`SchemaRegistry`], which can
//! be shared between builders on different threads.

pub mod builder;
pub mod error;
pub mod registry;
pub mod spec;
pub mod synth;

pub use builder::*;
pub use error::*;
pub use registry::*;
pub use spec::*;
pub use synth::{object_schema, synthesize, type_schema, Synthesis};
