// Validation traits

use crate::ValidationError;

/// Trait for validatable types.
///
/// `#[derive(Structured)]` implements it from `#[validate(..)]` field rules.
pub trait Validate {
    /// Validate the value and return errors if any
    fn validate(&self) -> Result<(), Vec<ValidationError>>;
}

/// A validator registered for one concrete type
pub trait TypeValidator<T>: Send + Sync {
    fn validate(&self, value: &T) -> Vec<ValidationError>;
}

impl<T, F> TypeValidator<T> for F
where
    F: Fn(&T) -> Vec<ValidationError> + Send + Sync,
{
    fn validate(&self, value: &T) -> Vec<ValidationError> {
        self(value)
    }
}
