// Pre-invocation validation of structured arguments

use crate::binding::BindingPlan;
use crate::metadata::BoundArg;
use stencil_validation::{ValidationError, ValidatorRegistry};

/// Declarative rules plus registered validators, behind a global switch
#[derive(Debug, Clone, Default)]
pub struct ValidationPipeline {
    enabled: bool,
    registry: ValidatorRegistry,
}

impl ValidationPipeline {
    pub fn new(enabled: bool, registry: ValidatorRegistry) -> Self {
        Self { enabled, registry }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    /// Errors for every structured argument, in parameter order; empty
    /// when the pipeline is off
    pub fn validate(&self, plan: &BindingPlan, args: &[BoundArg]) -> Vec<ValidationError> {
        if !self.enabled {
            return Vec::new();
        }

        let mut errors = Vec::new();
        for (entry, arg) in plan.entries().iter().zip(args) {
            if !entry.param.class.is_structured() {
                continue;
            }
            let arg: &dyn std::any::Any = &**arg;
            errors.extend(entry.param.check(arg));
            if let Some(target) = entry.param.validation_target(arg) {
                errors.extend(self.registry.validate(target));
            }
        }
        errors
    }
}
