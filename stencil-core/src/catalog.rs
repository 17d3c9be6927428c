//! Operation discovery and the endpoint catalog.
//!
//! [`CatalogBuilder`] visits each registered service module once, keeps the
//! operations eligible for exposure, runs route/verb inference and binding
//! planning, and publishes an immutable [`EndpointCatalog`]. A module whose
//! metadata is unusable is logged and left out; it never stops the build.

use crate::binding::BindingPlan;
use crate::config::RouteStyle;
use crate::error::DiscoveryError;
use crate::inference;
use crate::logging::{debug, info, warn};
use crate::metadata::{registered_services, OperationMeta, ServiceMeta, ServiceModule, ServiceRegistration};
use crate::HttpMethod;
use std::any::TypeId;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Explicit route and/or verbs declared on an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOverride {
    pub route: Option<&'static str>,
    pub methods: Vec<&'static str>,
}

/// An operation selected for exposure
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    service_type: TypeId,
    service_name: &'static str,
    meta: OperationMeta,
    route_override: Option<RouteOverride>,
}

impl OperationDescriptor {
    fn new(service: &ServiceMeta, meta: OperationMeta) -> Self {
        let route_override = meta.has_override().then(|| RouteOverride {
            route: meta.route,
            methods: meta.methods.clone(),
        });
        Self {
            service_type: service.type_id,
            service_name: service.type_name,
            meta,
            route_override,
        }
    }

    pub fn service_type(&self) -> TypeId {
        self.service_type
    }

    pub fn service_name(&self) -> &'static str {
        self.service_name
    }

    pub fn name(&self) -> &'static str {
        self.meta.name
    }

    pub fn meta(&self) -> &OperationMeta {
        &self.meta
    }

    pub fn route_override(&self) -> Option<&RouteOverride> {
        self.route_override.as_ref()
    }
}

/// A synthesized endpoint: route template, verbs and binding plan
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    route: String,
    verbs: Vec<HttpMethod>,
    tag: &'static str,
    operation: OperationDescriptor,
    plan: BindingPlan,
}

impl EndpointDescriptor {
    /// Final route template, prefix included
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Verbs in declaration order; never empty
    pub fn verbs(&self) -> &[HttpMethod] {
        &self.verbs
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn operation(&self) -> &OperationDescriptor {
        &self.operation
    }

    pub fn plan(&self) -> &BindingPlan {
        &self.plan
    }
}

/// A module left out of the catalog and why
#[derive(Debug, Clone)]
pub struct SkippedModule {
    pub service: String,
    pub error: DiscoveryError,
}

/// Every endpoint of the application, built once and shared read-only
#[derive(Debug, Clone, Default)]
pub struct EndpointCatalog {
    endpoints: Vec<Arc<EndpointDescriptor>>,
    skipped: Vec<SkippedModule>,
}

impl EndpointCatalog {
    pub fn iter(&self) -> impl Iterator<Item = &Arc<EndpointDescriptor>> {
        self.endpoints.iter()
    }

    pub fn endpoints(&self) -> &[Arc<EndpointDescriptor>] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Modules that failed discovery
    pub fn skipped(&self) -> &[SkippedModule] {
        &self.skipped
    }

    /// The endpoint for an operation of a given service
    pub fn find<S: 'static>(&self, operation: &str) -> Option<&Arc<EndpointDescriptor>> {
        self.endpoints.iter().find(|e| {
            e.operation.service_type == TypeId::of::<S>() && e.operation.name() == operation
        })
    }

    /// The endpoint registered at `route` for `verb`
    pub fn find_route(&self, verb: HttpMethod, route: &str) -> Option<&Arc<EndpointDescriptor>> {
        self.endpoints
            .iter()
            .find(|e| e.route == route && e.verbs.contains(&verb))
    }
}

impl<'a> IntoIterator for &'a EndpointCatalog {
    type Item = &'a Arc<EndpointDescriptor>;
    type IntoIter = std::slice::Iter<'a, Arc<EndpointDescriptor>>;

    fn into_iter(self) -> Self::IntoIter {
        self.endpoints.iter()
    }
}

/// Collects service modules and builds the [`EndpointCatalog`]
#[derive(Default)]
pub struct CatalogBuilder {
    style: RouteStyle,
    modules: Vec<(&'static str, fn() -> ServiceMeta)>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route_style(mut self, style: RouteStyle) -> Self {
        self.style = style;
        self
    }

    /// Add one module explicitly
    pub fn module<S: ServiceModule>(mut self) -> Self {
        self.modules
            .push((std::any::type_name::<S>(), S::metadata));
        self
    }

    pub fn registration(mut self, registration: &ServiceRegistration) -> Self {
        self.modules
            .push((registration.type_name, registration.metadata));
        self
    }

    /// Add every module registered through `#[service]`
    pub fn discover(mut self) -> Self {
        for registration in registered_services() {
            self = self.registration(registration);
        }
        self
    }

    pub fn build(self) -> EndpointCatalog {
        let mut catalog = EndpointCatalog::default();
        let mut visited = HashSet::new();

        for (name, metadata) in self.modules {
            let service = match load(name, metadata) {
                Ok(service) => service,
                Err(error) => {
                    warn!(service = name, error = %error, "Skipping service module");
                    catalog.skipped.push(SkippedModule {
                        service: name.to_string(),
                        error,
                    });
                    continue;
                }
            };

            if !visited.insert(service.type_id) {
                debug!(service = service.type_name, "Service module already visited");
                continue;
            }

            if service.ignored {
                debug!(service = service.type_name, "Service module is marked ignore");
                continue;
            }

            match build_module(&service, self.style) {
                Ok(endpoints) => {
                    debug!(
                        service = service.type_name,
                        endpoints = endpoints.len(),
                        "Service module cataloged"
                    );
                    catalog.endpoints.extend(endpoints.into_iter().map(Arc::new));
                }
                Err(error) => {
                    warn!(service = service.type_name, error = %error, "Skipping service module");
                    catalog.skipped.push(SkippedModule {
                        service: service.type_name.to_string(),
                        error,
                    });
                }
            }
        }

        info!(
            endpoints = catalog.endpoints.len(),
            skipped = catalog.skipped.len(),
            "Endpoint catalog built"
        );
        catalog
    }
}

/// Run a metadata function, turning a panic into a discovery error
fn load(name: &str, metadata: fn() -> ServiceMeta) -> Result<ServiceMeta, DiscoveryError> {
    panic::catch_unwind(AssertUnwindSafe(metadata)).map_err(|payload| {
        DiscoveryError::MetadataUnavailable {
            service: name.to_string(),
            reason: panic_message(payload.as_ref()),
        }
    })
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panicked".to_string())
}

fn build_module(
    service: &ServiceMeta,
    style: RouteStyle,
) -> Result<Vec<EndpointDescriptor>, DiscoveryError> {
    let mut endpoints = Vec::with_capacity(service.operations.len());
    let mut seen = HashSet::new();

    for operation in &service.operations {
        if service.ignored_operations.contains(&operation.name) {
            continue;
        }
        if !seen.insert(operation.name) {
            debug!(operation = operation.name, "Operation already visited");
            continue;
        }

        let mut params = HashSet::new();
        for param in &operation.params {
            if !params.insert(param.name) {
                return Err(DiscoveryError::DuplicateParameter {
                    operation: operation.name.to_string(),
                    param: param.name.to_string(),
                });
            }
        }

        let (verbs, route) = inference::resolve(operation, service.prefix, style)?;
        let plan = BindingPlan::new(operation.name, &operation.params, &route, verbs[0])?;

        debug!(
            operation = operation.name,
            route = %route,
            verbs = ?verbs,
            "Endpoint synthesized"
        );

        endpoints.push(EndpointDescriptor {
            route,
            verbs,
            tag: service.display_tag(),
            operation: OperationDescriptor::new(service, operation.clone()),
            plan,
        });
    }

    Ok(endpoints)
}
