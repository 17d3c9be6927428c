//! Service metadata and link-time registration.
//!
//! `#[service]` turns an inherent `impl` block into a [`ServiceModule`]
//! implementation whose [`ServiceModule::metadata`] describes every public
//! `&self` method, and submits a [`ServiceRegistration`] to the `inventory`
//! table so the catalog builder can find the module without an explicit list.
//!
//! Everything the engine needs to know about a parameter type is captured
//! here once, as plain function pointers built from its [`Param`] impl.

use crate::classify::{FieldInfo, Param, Raw, TypeClass};
use crate::dispatch::Outcome;
use std::any::{Any, TypeId};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use stencil_validation::ValidationError;

/// A bound argument, erased until the invoker takes it back out
pub type BoundArg = Box<dyn Any + Send>;

/// A resolved service instance
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Future returned by an [`Invoker`]
pub type OperationFuture = Pin<Box<dyn Future<Output = Outcome> + Send>>;

/// Calls one operation on a resolved instance with bound arguments
pub type Invoker = fn(Instance, Arguments) -> OperationFuture;

/// A type that exposes its operations as endpoints
pub trait ServiceModule: Send + Sync + 'static {
    fn metadata() -> ServiceMeta;
}

/// Metadata for one service module
#[derive(Debug)]
pub struct ServiceMeta {
    pub type_id: TypeId,
    pub type_name: &'static str,
    /// Route prefix prepended to every inferred or override route
    pub prefix: Option<&'static str>,
    /// Display tag for grouping in generated documents
    pub tag: Option<&'static str>,
    /// `#[service(ignore)]`
    pub ignored: bool,
    pub operations: Vec<OperationMeta>,
    /// Names of methods carrying `#[operation(ignore)]`
    pub ignored_operations: Vec<&'static str>,
}

impl ServiceMeta {
    pub fn new<S: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            type_name: std::any::type_name::<S>(),
            prefix: None,
            tag: None,
            ignored: false,
            operations: Vec::new(),
            ignored_operations: Vec::new(),
        }
    }

    pub fn prefix(mut self, prefix: &'static str) -> Self {
        self.prefix = Some(prefix);
        self
    }

    pub fn tag(mut self, tag: &'static str) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn ignore(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn operation(mut self, operation: OperationMeta) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn ignored_operation(mut self, name: &'static str) -> Self {
        self.ignored_operations.push(name);
        self
    }

    /// Tag used for documents: the declared tag or the short type name
    pub fn display_tag(&self) -> &'static str {
        self.tag
            .unwrap_or_else(|| self.type_name.rsplit("::").next().unwrap_or(self.type_name))
    }
}

/// Metadata for one operation
#[derive(Clone)]
pub struct OperationMeta {
    pub name: &'static str,
    pub params: Vec<ParamMeta>,
    /// Route from `#[operation(route = ..)]`
    pub route: Option<&'static str>,
    /// Verbs from `#[operation(method = ..)]` or `methods = [..]`
    pub methods: Vec<&'static str>,
    /// Declared return type, as written
    pub returns: &'static str,
    pub is_async: bool,
    pub invoke: Invoker,
}

impl OperationMeta {
    pub fn new(name: &'static str, invoke: Invoker) -> Self {
        Self {
            name,
            params: Vec::new(),
            route: None,
            methods: Vec::new(),
            returns: "()",
            is_async: false,
            invoke,
        }
    }

    pub fn param(mut self, param: ParamMeta) -> Self {
        self.params.push(param);
        self
    }

    pub fn route(mut self, route: &'static str) -> Self {
        self.route = Some(route);
        self
    }

    pub fn method(mut self, method: &'static str) -> Self {
        self.methods.push(method);
        self
    }

    pub fn returns(mut self, returns: &'static str) -> Self {
        self.returns = returns;
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }

    pub fn has_override(&self) -> bool {
        self.route.is_some() || !self.methods.is_empty()
    }
}

impl fmt::Debug for OperationMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationMeta")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("route", &self.route)
            .field("methods", &self.methods)
            .field("returns", &self.returns)
            .field("is_async", &self.is_async)
            .finish_non_exhaustive()
    }
}

/// Metadata for one parameter, erased over its type
#[derive(Clone, Copy)]
pub struct ParamMeta {
    pub name: &'static str,
    pub type_name: &'static str,
    pub class: TypeClass,
    pub nullable: bool,
    /// Text from `#[param(default = ..)]`
    pub default: Option<&'static str>,
    binder: fn(Raw<'_>) -> Result<BoundArg, String>,
    empty: fn() -> Option<BoundArg>,
    check: fn(&dyn Any) -> Vec<ValidationError>,
    target: fn(&dyn Any) -> Option<&dyn Any>,
    fields: fn() -> &'static [FieldInfo],
}

impl ParamMeta {
    pub fn of<T: Param>(name: &'static str, default: Option<&'static str>) -> Self {
        Self {
            name,
            type_name: std::any::type_name::<T>(),
            class: T::CLASS,
            nullable: T::NULLABLE,
            default,
            binder: bind_erased::<T>,
            empty: empty_erased::<T>,
            check: check_erased::<T>,
            target: target_erased::<T>,
            fields: T::fields,
        }
    }

    /// Decode this parameter from raw request data
    pub fn bind(&self, raw: Raw<'_>) -> Result<BoundArg, String> {
        (self.binder)(raw)
    }

    /// The type's zero/empty value, if it has one
    pub fn empty(&self) -> Option<BoundArg> {
        (self.empty)()
    }

    /// Declarative rule errors for a bound argument of this parameter
    pub fn check(&self, arg: &dyn Any) -> Vec<ValidationError> {
        (self.check)(arg)
    }

    /// The value a registered validator is looked up for
    pub fn validation_target<'a>(&self, arg: &'a dyn Any) -> Option<&'a dyn Any> {
        (self.target)(arg)
    }

    pub fn fields(&self) -> &'static [FieldInfo] {
        (self.fields)()
    }

    /// Short type name without module paths, e.g. `Option<User>`
    pub fn short_type_name(&self) -> String {
        short_type_name(self.type_name)
    }
}

impl fmt::Debug for ParamMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamMeta")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("class", &self.class)
            .field("nullable", &self.nullable)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

fn bind_erased<T: Param>(raw: Raw<'_>) -> Result<BoundArg, String> {
    T::bind(raw).map(|value| Box::new(value) as BoundArg)
}

fn empty_erased<T: Param>() -> Option<BoundArg> {
    T::empty().map(|value| Box::new(value) as BoundArg)
}

fn check_erased<T: Param>(arg: &dyn Any) -> Vec<ValidationError> {
    arg.downcast_ref::<T>().map(T::check).unwrap_or_default()
}

fn target_erased<T: Param>(arg: &dyn Any) -> Option<&dyn Any> {
    arg.downcast_ref::<T>().and_then(|value| value.validation_target())
}

/// Strip module paths from a `std::any::type_name` string
pub fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();

    for ch in full.chars() {
        match ch {
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';' => {
                out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
                segment.clear();
                out.push(ch);
            }
            _ => segment.push(ch),
        }
    }
    out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
    out
}

/// Arguments bound for one invocation, in declaration order
#[derive(Default)]
pub struct Arguments {
    values: Vec<Option<BoundArg>>,
}

impl Arguments {
    pub fn new(values: Vec<BoundArg>) -> Self {
        Self {
            values: values.into_iter().map(Some).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&(dyn Any + Send)> {
        self.values.get(index).and_then(|value| value.as_deref())
    }

    /// Move argument `index` out as a `T`
    pub fn take<T: 'static>(&mut self, index: usize) -> Result<T, Outcome> {
        let value = self
            .values
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| Outcome::faulted(format!("argument {} is missing", index)))?;

        value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
            Outcome::faulted(format!(
                "argument {} is not a `{}`",
                index,
                std::any::type_name::<T>()
            ))
        })
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments").field("len", &self.len()).finish()
    }
}

/// A link-time registration entry submitted by `#[service]`
pub struct ServiceRegistration {
    pub type_name: &'static str,
    pub metadata: fn() -> ServiceMeta,
}

inventory::collect!(ServiceRegistration);

impl ServiceRegistration {
    pub const fn new(type_name: &'static str, metadata: fn() -> ServiceMeta) -> Self {
        Self {
            type_name,
            metadata,
        }
    }
}

/// Every module registered through `#[service]` in the final binary
pub fn registered_services() -> Vec<&'static ServiceRegistration> {
    inventory::iter::<ServiceRegistration>.into_iter().collect()
}

/// Register a manually implemented [`ServiceModule`] for discovery
#[macro_export]
macro_rules! register_service {
    ($service:ty) => {
        $crate::inventory::submit! {
            $crate::metadata::ServiceRegistration::new(
                ::std::stringify!($service),
                <$service as $crate::metadata::ServiceModule>::metadata,
            )
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_meta_captures_classification() {
        let meta = ParamMeta::of::<Option<i32>>("page", Some("1"));
        assert_eq!(meta.class, TypeClass::Simple);
        assert!(meta.nullable);
        assert_eq!(meta.default, Some("1"));
        assert_eq!(meta.short_type_name(), "Option<i32>");
    }

    #[test]
    fn test_param_meta_binds_erased_values() {
        let meta = ParamMeta::of::<u64>("id", None);
        let bound = meta.bind(Raw::Text("17")).unwrap();
        assert_eq!(bound.downcast_ref::<u64>(), Some(&17));
        assert!(meta.bind(Raw::Text("x")).is_err());

        let empty = meta.empty().unwrap();
        assert_eq!(empty.downcast_ref::<u64>(), Some(&0));
    }

    #[test]
    fn test_arguments_take_checks_type_and_presence() {
        let mut args = Arguments::new(vec![Box::new(5i32), Box::new("x".to_string())]);
        assert_eq!(args.take::<i32>(0).unwrap(), 5);
        assert!(args.take::<i32>(0).is_err());
        assert!(args.take::<i32>(1).is_err());
        assert!(args.take::<String>(7).is_err());
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(
            short_type_name("alloc::vec::Vec<my_app::models::User>"),
            "Vec<User>"
        );
        assert_eq!(short_type_name("i32"), "i32");
    }

    #[test]
    fn test_display_tag_falls_back_to_type_name() {
        struct Orders;
        let meta = ServiceMeta::new::<Orders>();
        assert_eq!(meta.display_tag(), "Orders");
        assert_eq!(meta.tag("Sales").display_tag(), "Sales");
    }
}
