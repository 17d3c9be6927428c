//! Validation for Stencil operations
//!
//! Two kinds of checks run against structured arguments before an operation
//! is invoked:
//!
//! * declarative field rules, expanded by `#[derive(Structured)]` from
//!   `#[validate(..)]` attributes into a [`Validate`] impl built on [`rules`];
//! * type-specific validators held in a [`ValidatorRegistry`].
//!
//! # Examples
//!
//! ```
//! use stencil_validation::{rules, Validate, ValidationError, ValidatorRegistry};
//!
//! struct SignUp {
//!     name: String,
//!     email: String,
//! }
//!
//! impl Validate for SignUp {
//!     fn validate(&self) -> Result<(), Vec<ValidationError>> {
//!         let mut errors = Vec::new();
//!         rules::required(&self.name, "name", &mut errors);
//!         rules::email(&self.email, "email", &mut errors);
//!         if errors.is_empty() { Ok(()) } else { Err(errors) }
//!     }
//! }
//!
//! let input = SignUp { name: "Ada".into(), email: "ada@example.com".into() };
//! assert!(input.validate().is_ok());
//!
//! let registry = ValidatorRegistry::new().with::<SignUp, _>(|s: &SignUp| {
//!     if s.name == "root" {
//!         vec![ValidationError::new("name", "name is reserved")]
//!     } else {
//!         Vec::new()
//!     }
//! });
//! assert!(registry.validate(&input).is_empty());
//! ```

mod errors;
mod registry;
pub mod rules;
mod traits;
mod validators;

pub use errors::*;
pub use registry::*;
pub use traits::*;
pub use validators::*;
