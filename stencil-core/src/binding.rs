//! Parameter binding plans.
//!
//! A [`BindingPlan`] is computed once per endpoint and says, for every
//! parameter, where its value comes from. At request time
//! [`BindingPlan::bind`] walks the plan and produces the erased arguments
//! for the invoker.

use crate::classify::{Raw, SpecialKind, TypeClass};
use crate::config::MissingParamPolicy;
use crate::context::RequestContext;
use crate::error::{BindError, DiscoveryError};
use crate::inference::placeholders;
use crate::logging::trace;
use crate::metadata::{BoundArg, ParamMeta};
use crate::HttpMethod;
use std::fmt;
use stencil_validation::ValidationError;

/// Where a parameter's value is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingSource {
    /// A `{name}` segment of the route template
    Path { name: String },
    /// A single query key
    Query { name: String },
    /// Every query key starting with `prefix`, prefix stripped
    FlattenedQuery { prefix: String },
    /// The request payload
    Body,
    /// A runtime handle
    Injected(SpecialKind),
}

impl fmt::Display for BindingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingSource::Path { name } => write!(f, "path `{}`", name),
            BindingSource::Query { name } => write!(f, "query `{}`", name),
            BindingSource::FlattenedQuery { prefix } => write!(f, "query `{}*`", prefix),
            BindingSource::Body => f.write_str("body"),
            BindingSource::Injected(kind) => write!(f, "injected {:?}", kind),
        }
    }
}

/// One parameter and its source
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub param: ParamMeta,
    pub source: BindingSource,
}

/// Why arguments could not be produced for a request
#[derive(Debug)]
pub enum Rejection {
    /// A value was present but could not be decoded
    Invalid(BindError),
    /// Required simple parameters were absent under [`MissingParamPolicy::Reject`]
    Missing(Vec<ValidationError>),
}

/// Per-endpoint binding plan, in parameter declaration order
#[derive(Debug, Clone)]
pub struct BindingPlan {
    verb: HttpMethod,
    entries: Vec<PlanEntry>,
}

impl BindingPlan {
    /// Plan binding for `params` under the final `route` and the verb the
    /// plan is computed against
    pub fn new(
        operation: &str,
        params: &[ParamMeta],
        route: &str,
        verb: HttpMethod,
    ) -> Result<Self, DiscoveryError> {
        let names = placeholders(route);

        for placeholder in &names {
            let bound = params
                .iter()
                .any(|p| p.name == *placeholder && p.class == TypeClass::Simple);
            if !bound {
                return Err(DiscoveryError::UnboundPlaceholder {
                    operation: operation.to_string(),
                    route: route.to_string(),
                    placeholder: placeholder.to_string(),
                });
            }
        }

        let mut body_taken = verb == HttpMethod::GET;
        let entries = params
            .iter()
            .map(|param| {
                let source = match param.class {
                    TypeClass::Special(kind) => BindingSource::Injected(kind),
                    TypeClass::Simple if names.contains(&param.name) => BindingSource::Path {
                        name: param.name.to_string(),
                    },
                    TypeClass::Simple => BindingSource::Query {
                        name: param.name.to_string(),
                    },
                    TypeClass::Structured if !body_taken => {
                        body_taken = true;
                        BindingSource::Body
                    }
                    TypeClass::Structured => BindingSource::FlattenedQuery {
                        prefix: format!("{}_", param.name),
                    },
                };
                PlanEntry {
                    param: *param,
                    source,
                }
            })
            .collect();

        Ok(Self { verb, entries })
    }

    /// The verb this plan was computed against
    pub fn verb(&self) -> HttpMethod {
        self.verb
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// The body-bound entry, if any
    pub fn body(&self) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.source == BindingSource::Body)
    }

    /// Produce the arguments for one request
    pub fn bind(
        &self,
        context: &RequestContext,
        policy: MissingParamPolicy,
    ) -> Result<Vec<BoundArg>, Rejection> {
        let request = context.request();
        let mut args = Vec::with_capacity(self.entries.len());
        let mut missing = Vec::new();

        for entry in &self.entries {
            let param = &entry.param;
            let invalid =
                |message: String| Rejection::Invalid(BindError::new(param.name, param.type_name, message));

            let bound = match &entry.source {
                BindingSource::Injected(_) => param.bind(Raw::Injected(context)).map_err(invalid)?,
                BindingSource::Path { name } => {
                    let value = request.path_params.get(name).map(String::as_str);
                    match bind_simple(param, value, policy).map_err(invalid)? {
                        Some(arg) => arg,
                        None => {
                            missing.push(required(param.name));
                            continue;
                        }
                    }
                }
                BindingSource::Query { name } => {
                    let value = request.query_params.get(name).map(String::as_str);
                    match bind_simple(param, value, policy).map_err(invalid)? {
                        Some(arg) => arg,
                        None => {
                            missing.push(required(param.name));
                            continue;
                        }
                    }
                }
                BindingSource::FlattenedQuery { prefix } => {
                    let mut fields: Vec<(String, String)> = request
                        .query_params
                        .iter()
                        .filter_map(|(key, value)| {
                            key.strip_prefix(prefix.as_str())
                                .filter(|field| !field.is_empty())
                                .map(|field| (field.to_string(), value.clone()))
                        })
                        .collect();
                    fields.sort();

                    if fields.is_empty() {
                        absent_structured(param)
                            .unwrap_or_else(|| param.bind(Raw::Fields(&[])))
                            .map_err(invalid)?
                    } else {
                        param.bind(Raw::Fields(&fields)).map_err(invalid)?
                    }
                }
                BindingSource::Body => {
                    if request.has_body() {
                        param
                            .bind(Raw::Body {
                                data: &request.body,
                                content_type: request.content_type(),
                            })
                            .map_err(invalid)?
                    } else {
                        absent_structured(param)
                            .unwrap_or_else(|| Err("the request has no body".to_string()))
                            .map_err(invalid)?
                    }
                }
            };

            trace!(param = param.name, source = %entry.source, "Bound parameter");
            args.push(bound);
        }

        if missing.is_empty() {
            Ok(args)
        } else {
            Err(Rejection::Missing(missing))
        }
    }
}

/// Bind a simple parameter; `Ok(None)` means missing under the reject policy
fn bind_simple(
    param: &ParamMeta,
    value: Option<&str>,
    policy: MissingParamPolicy,
) -> Result<Option<BoundArg>, String> {
    let value = value.filter(|v| !(param.nullable && v.is_empty()));

    if let Some(text) = value {
        return param.bind(Raw::Text(text)).map(Some);
    }
    if let Some(default) = param.default {
        return param.bind(Raw::Text(default)).map(Some);
    }
    if param.nullable || policy == MissingParamPolicy::ZeroValue {
        return param
            .empty()
            .map(Some)
            .ok_or_else(|| "no value supplied and the type has no zero value".to_string());
    }
    Ok(None)
}

/// Value of a structured parameter with no payload: the declared default
/// (JSON text), else the type's empty instance
fn absent_structured(param: &ParamMeta) -> Option<Result<BoundArg, String>> {
    if let Some(default) = param.default {
        return Some(param.bind(Raw::Body {
            data: default.as_bytes(),
            content_type: Some("application/json"),
        }));
    }
    param.empty().map(Ok)
}

fn required(field: &str) -> ValidationError {
    ValidationError::new(field, format!("{} is required", field)).with_constraint("required")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpRequest;
    use serde::{Deserialize, Serialize};
    use tokio_util::sync::CancellationToken;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Page {
        page: u32,
        size: Option<u32>,
    }

    crate::structured_param!(Page, default);

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
    }

    crate::structured_param!(User);

    fn context(request: HttpRequest) -> RequestContext {
        RequestContext::new(request, "/", HttpMethod::GET, CancellationToken::new())
    }

    fn take<T: 'static>(arg: BoundArg) -> T {
        *arg.downcast::<T>().unwrap()
    }

    #[test]
    fn test_plan_sources() {
        let params = [
            ParamMeta::of::<i32>("id", None),
            ParamMeta::of::<User>("user", None),
            ParamMeta::of::<Page>("paging", None),
            ParamMeta::of::<String>("note", None),
            ParamMeta::of::<HttpRequest>("request", None),
        ];
        let plan = BindingPlan::new("update", &params, "/update/{id}", HttpMethod::PUT).unwrap();
        let sources: Vec<_> = plan.entries().iter().map(|e| e.source.clone()).collect();

        assert_eq!(
            sources,
            vec![
                BindingSource::Path { name: "id".into() },
                BindingSource::Body,
                BindingSource::FlattenedQuery {
                    prefix: "paging_".into()
                },
                BindingSource::Query { name: "note".into() },
                BindingSource::Injected(SpecialKind::Request),
            ]
        );
        assert_eq!(plan.body().map(|e| e.param.name), Some("user"));
    }

    #[test]
    fn test_get_never_binds_a_body() {
        let params = [ParamMeta::of::<Page>("query", None)];
        let plan = BindingPlan::new("list", &params, "/list", HttpMethod::GET).unwrap();
        assert!(plan.body().is_none());
    }

    #[test]
    fn test_unbound_placeholder_is_a_discovery_error() {
        let params = [ParamMeta::of::<User>("slug", None)];
        let err = BindingPlan::new("show", &params, "/show/{slug}", HttpMethod::POST).unwrap_err();
        assert!(matches!(err, DiscoveryError::UnboundPlaceholder { ref placeholder, .. } if placeholder == "slug"));
    }

    #[test]
    fn test_flattened_query_round_trip() {
        let params = [ParamMeta::of::<Page>("query", None)];
        let plan = BindingPlan::new("list", &params, "/list", HttpMethod::GET).unwrap();
        let request = HttpRequest::new("GET", "/list")
            .with_query("query_page", "4")
            .with_query("query_size", "25")
            .with_query("page", "99");

        let mut args = plan
            .bind(&context(request), MissingParamPolicy::ZeroValue)
            .unwrap();
        assert_eq!(
            take::<Page>(args.remove(0)),
            Page {
                page: 4,
                size: Some(25)
            }
        );
    }

    #[test]
    fn test_missing_simple_uses_default_then_zero() {
        let params = [
            ParamMeta::of::<u32>("page", Some("1")),
            ParamMeta::of::<u32>("size", None),
            ParamMeta::of::<Option<u32>>("limit", None),
        ];
        let plan = BindingPlan::new("list", &params, "/list", HttpMethod::GET).unwrap();
        let request = HttpRequest::new("GET", "/list").with_query("limit", "");

        let mut args = plan
            .bind(&context(request), MissingParamPolicy::ZeroValue)
            .unwrap()
            .into_iter();
        assert_eq!(take::<u32>(args.next().unwrap()), 1);
        assert_eq!(take::<u32>(args.next().unwrap()), 0);
        assert_eq!(take::<Option<u32>>(args.next().unwrap()), None);
    }

    #[test]
    fn test_missing_simple_is_rejected_in_strict_mode() {
        let params = [
            ParamMeta::of::<u32>("page", None),
            ParamMeta::of::<Option<u32>>("size", None),
        ];
        let plan = BindingPlan::new("list", &params, "/list", HttpMethod::GET).unwrap();

        match plan.bind(&context(HttpRequest::new("GET", "/list")), MissingParamPolicy::Reject) {
            Err(Rejection::Missing(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "page");
                assert_eq!(errors[0].constraint, "required");
            }
            other => panic!("expected missing parameters, got {:?}", other.map(|a| a.len())),
        }
    }

    #[test]
    fn test_unparseable_value_names_param_and_type() {
        let params = [ParamMeta::of::<i32>("id", None)];
        let plan = BindingPlan::new("get", &params, "/get/{id}", HttpMethod::GET).unwrap();
        let mut request = HttpRequest::new("GET", "/get/abc");
        request.path_params.insert("id".into(), "abc".into());

        match plan.bind(&context(request), MissingParamPolicy::ZeroValue) {
            Err(Rejection::Invalid(err)) => {
                assert_eq!(err.param, "id");
                assert_eq!(err.type_name, "i32");
            }
            other => panic!("expected a bind error, got {:?}", other.map(|a| a.len())),
        }
    }

    #[test]
    fn test_body_absent_without_empty_instance_is_an_error() {
        let params = [ParamMeta::of::<User>("user", None)];
        let plan = BindingPlan::new("create", &params, "/create", HttpMethod::POST).unwrap();
        let result = plan.bind(
            &context(HttpRequest::new("POST", "/create")),
            MissingParamPolicy::ZeroValue,
        );
        assert!(matches!(result, Err(Rejection::Invalid(_))));
    }

    #[test]
    fn test_body_absent_uses_json_default() {
        let params = [ParamMeta::of::<User>("user", Some(r#"{"name":"guest"}"#))];
        let plan = BindingPlan::new("create", &params, "/create", HttpMethod::POST).unwrap();
        let mut args = plan
            .bind(
                &context(HttpRequest::new("POST", "/create")),
                MissingParamPolicy::ZeroValue,
            )
            .unwrap();
        assert_eq!(take::<User>(args.remove(0)).name, "guest");
    }

    #[test]
    fn test_form_body_is_lenient_for_types_with_empty_instance() {
        let params = [ParamMeta::of::<Page>("page", None)];
        let plan = BindingPlan::new("save", &params, "/save", HttpMethod::POST).unwrap();
        let request = HttpRequest::new("POST", "/save")
            .with_form(&[("page", "2"), ("size", "lots"), ("extra", "1")])
            .unwrap();

        let mut args = plan
            .bind(&context(request), MissingParamPolicy::ZeroValue)
            .unwrap();
        assert_eq!(take::<Page>(args.remove(0)), Page { page: 2, size: None });
    }
}
