// Type-specific validator registry

use crate::{TypeValidator, ValidationError};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type ErasedValidator = Arc<dyn Fn(&dyn Any) -> Vec<ValidationError> + Send + Sync>;

/// Validators keyed by the exact type they check.
///
/// At most one validator per type; registering again replaces it. A value
/// whose type has no validator passes.
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: HashMap<TypeId, (&'static str, ErasedValidator)>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the validator for `T`
    pub fn register<T, V>(&mut self, validator: V) -> &mut Self
    where
        T: 'static,
        V: TypeValidator<T> + 'static,
    {
        let erased: ErasedValidator = Arc::new(move |value: &dyn Any| {
            value
                .downcast_ref::<T>()
                .map(|typed| validator.validate(typed))
                .unwrap_or_default()
        });
        self.validators
            .insert(TypeId::of::<T>(), (std::any::type_name::<T>(), erased));
        self
    }

    /// Builder-style [`register`](Self::register)
    pub fn with<T, V>(mut self, validator: V) -> Self
    where
        T: 'static,
        V: TypeValidator<T> + 'static,
    {
        self.register::<T, V>(validator);
        self
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.validators.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Run the validator registered for the value's concrete type
    pub fn validate(&self, value: &dyn Any) -> Vec<ValidationError> {
        self.validators
            .get(&value.type_id())
            .map(|(_, validator)| validator(value))
            .unwrap_or_default()
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.validators.values().map(|(name, _)| name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Transfer {
        amount: i64,
    }

    struct AmountPositive;

    impl TypeValidator<Transfer> for AmountPositive {
        fn validate(&self, value: &Transfer) -> Vec<ValidationError> {
            if value.amount > 0 {
                Vec::new()
            } else {
                vec![ValidationError::new("amount", "amount must be positive")]
            }
        }
    }

    #[test]
    fn test_validator_runs_for_exact_type_only() {
        let registry = ValidatorRegistry::new().with::<Transfer, _>(AmountPositive);

        assert!(registry.contains::<Transfer>());
        assert_eq!(registry.validate(&Transfer { amount: -1 }).len(), 1);
        assert!(registry.validate(&Transfer { amount: 5 }).is_empty());
        assert!(registry.validate(&5i64).is_empty());
    }

    #[test]
    fn test_closures_are_validators() {
        let mut registry = ValidatorRegistry::new();
        registry.register::<String, _>(|value: &String| {
            if value.is_empty() {
                vec![ValidationError::new("value", "empty")]
            } else {
                Vec::new()
            }
        });
        assert_eq!(registry.validate(&String::new()).len(), 1);
    }
}
