//! Route and verb inference.
//!
//! Given an operation's name and parameter shape, decide which HTTP verbs
//! serve it and under which route template. Explicit overrides always win;
//! everything here is pure and runs once per operation at catalog build time.

use crate::classify::TypeClass;
use crate::config::RouteStyle;
use crate::error::DiscoveryError;
use crate::metadata::{OperationMeta, ParamMeta};
use crate::HttpMethod;

/// Name prefixes that imply a verb, checked in order
const VERB_PREFIXES: &[(&str, HttpMethod)] = &[
    ("get", HttpMethod::GET),
    ("find", HttpMethod::GET),
    ("search", HttpMethod::GET),
    ("list", HttpMethod::GET),
    ("create", HttpMethod::POST),
    ("add", HttpMethod::POST),
    ("post", HttpMethod::POST),
    ("update", HttpMethod::PUT),
    ("put", HttpMethod::PUT),
    ("edit", HttpMethod::PUT),
    ("delete", HttpMethod::DELETE),
    ("remove", HttpMethod::DELETE),
    ("patch", HttpMethod::PATCH),
];

/// Verb implied by an operation name.
///
/// Names without a known prefix fall back on shape: operations declaring any
/// parameter are POST, parameterless ones are GET.
pub fn infer_verb(name: &str, param_count: usize) -> HttpMethod {
    let lower = name.to_lowercase();
    VERB_PREFIXES
        .iter()
        .find(|(prefix, _)| lower.starts_with(prefix))
        .map(|(_, verb)| *verb)
        .unwrap_or(if param_count > 0 {
            HttpMethod::POST
        } else {
            HttpMethod::GET
        })
}

/// Route template for an operation without a route override, before the
/// module prefix is applied
pub fn infer_route(name: &str, params: &[ParamMeta], verb: HttpMethod, style: RouteStyle) -> String {
    let simple: Vec<&str> = params
        .iter()
        .filter(|p| p.class == TypeClass::Simple)
        .map(|p| p.name)
        .collect();
    let structured = params.iter().filter(|p| p.class.is_structured()).count();

    let placeholders: &[&str] = match (verb, simple.len(), structured) {
        (HttpMethod::GET, 1, 0) => &simple[..1],
        (HttpMethod::GET, _, _) => &[],
        (_, _, 0) => &simple,
        (_, n, _) if n > 0 => &simple[..1],
        _ => &[],
    };

    let mut route = format!("/{}", style.segment(name));
    for placeholder in placeholders {
        route.push_str("/{");
        route.push_str(placeholder);
        route.push('}');
    }
    route
}

/// Join a module prefix and a route, collapsing duplicate separators.
///
/// The result starts with exactly one `/` and has no trailing `/` unless it
/// is the root.
pub fn join_route(prefix: Option<&str>, route: &str) -> String {
    let segments: Vec<&str> = prefix
        .unwrap_or_default()
        .split('/')
        .chain(route.split('/'))
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect();

    format!("/{}", segments.join("/"))
}

/// Names of the `{name}` placeholders in a route template, in order
pub fn placeholders(route: &str) -> Vec<&str> {
    route
        .split('/')
        .filter_map(|segment| segment.strip_prefix('{')?.strip_suffix('}'))
        .collect()
}

/// Reject override routes the router could never match
pub fn check_route(operation: &str, route: &str) -> Result<(), DiscoveryError> {
    let malformed = |reason: &str| DiscoveryError::MalformedRoute {
        operation: operation.to_string(),
        route: route.to_string(),
        reason: reason.to_string(),
    };

    if route.chars().any(|c| c.is_whitespace() || matches!(c, '?' | '#' | '*')) {
        return Err(malformed("routes may not contain whitespace, `?`, `#` or `*`"));
    }

    for segment in route.split('/') {
        let opens = segment.matches('{').count();
        let closes = segment.matches('}').count();
        if opens == 0 && closes == 0 {
            continue;
        }
        let name = segment
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .filter(|_| opens == 1 && closes == 1)
            .ok_or_else(|| malformed("a placeholder must fill a whole segment"))?;
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(malformed("placeholder names must be identifiers"));
        }
    }

    Ok(())
}

/// Verbs and final route template of an operation under a module prefix.
///
/// The first verb is the one binding is planned against.
pub fn resolve(
    operation: &OperationMeta,
    prefix: Option<&str>,
    style: RouteStyle,
) -> Result<(Vec<HttpMethod>, String), DiscoveryError> {
    let mut verbs = Vec::with_capacity(operation.methods.len().max(1));
    for method in &operation.methods {
        let verb = HttpMethod::from_str(method).ok_or_else(|| DiscoveryError::UnknownMethod {
            operation: operation.name.to_string(),
            method: method.to_string(),
        })?;
        if !verbs.contains(&verb) {
            verbs.push(verb);
        }
    }
    if verbs.is_empty() {
        verbs.push(infer_verb(operation.name, operation.params.len()));
    }

    let route = match operation.route {
        Some(route) => {
            check_route(operation.name, route)?;
            join_route(prefix, route)
        }
        None => join_route(
            prefix,
            &infer_route(operation.name, &operation.params, verbs[0], style),
        ),
    };

    Ok((verbs, route))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Order {}

    crate::structured_param!(Order);

    fn simple(name: &'static str) -> ParamMeta {
        ParamMeta::of::<i32>(name, None)
    }

    fn structured(name: &'static str) -> ParamMeta {
        ParamMeta::of::<Order>(name, None)
    }

    #[test]
    fn test_verb_table() {
        assert_eq!(infer_verb("GetOrder", 0), HttpMethod::GET);
        assert_eq!(infer_verb("find_orders", 1), HttpMethod::GET);
        assert_eq!(infer_verb("CreateOrder", 1), HttpMethod::POST);
        assert_eq!(infer_verb("UpdateOrder", 1), HttpMethod::PUT);
        assert_eq!(infer_verb("DeleteOrder", 1), HttpMethod::DELETE);
        assert_eq!(infer_verb("remove_order", 1), HttpMethod::DELETE);
        assert_eq!(infer_verb("PatchOrder", 1), HttpMethod::PATCH);
        assert_eq!(infer_verb("Sync", 0), HttpMethod::GET);
        assert_eq!(infer_verb("Sync", 2), HttpMethod::POST);
    }

    #[test]
    fn test_get_with_one_simple_gets_a_placeholder() {
        let route = infer_route("get_user_by_id", &[simple("id")], HttpMethod::GET, RouteStyle::Compact);
        assert_eq!(route, "/getuserbyid/{id}");
    }

    #[test]
    fn test_get_with_many_inputs_has_no_placeholders() {
        let two = infer_route("search", &[simple("a"), simple("b")], HttpMethod::GET, RouteStyle::Compact);
        assert_eq!(two, "/search");

        let with_structured = infer_route(
            "search",
            &[simple("a"), structured("filter")],
            HttpMethod::GET,
            RouteStyle::Compact,
        );
        assert_eq!(with_structured, "/search");
    }

    #[test]
    fn test_non_get_without_structured_binds_all_simple_from_path() {
        let route = infer_route(
            "move_item",
            &[simple("from"), simple("to")],
            HttpMethod::POST,
            RouteStyle::Compact,
        );
        assert_eq!(route, "/moveitem/{from}/{to}");
    }

    #[test]
    fn test_non_get_with_structured_binds_first_simple_only() {
        let route = infer_route(
            "update_order",
            &[simple("id"), structured("order"), simple("version")],
            HttpMethod::PUT,
            RouteStyle::Snake,
        );
        assert_eq!(route, "/update_order/{id}");
    }

    #[test]
    fn test_join_route_collapses_separators() {
        assert_eq!(join_route(Some("api/users"), "/list"), "/api/users/list");
        assert_eq!(join_route(Some("/api//users/"), "//list/"), "/api/users/list");
        assert_eq!(join_route(None, "/"), "/");
        assert_eq!(join_route(Some("/"), ""), "/");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders("/a/{id}/b/{slug}"), vec!["id", "slug"]);
        assert!(placeholders("/a/b").is_empty());
    }

    #[test]
    fn test_check_route() {
        assert!(check_route("op", "/a/{id}").is_ok());
        assert!(check_route("op", "/a/{id").is_err());
        assert!(check_route("op", "/a/x{id}").is_err());
        assert!(check_route("op", "/a/{}").is_err());
        assert!(check_route("op", "/a?b").is_err());
    }

    #[test]
    fn test_resolve_honours_overrides() {
        fn noop(_: crate::metadata::Instance, _: crate::metadata::Arguments) -> crate::metadata::OperationFuture {
            Box::pin(async { crate::Outcome::empty() })
        }

        let op = OperationMeta::new("sync", noop)
            .param(simple("id"))
            .route("/sync/{id}")
            .method("put")
            .method("PATCH");
        let (verbs, route) = resolve(&op, Some("/jobs"), RouteStyle::Compact).unwrap();
        assert_eq!(verbs, vec![HttpMethod::PUT, HttpMethod::PATCH]);
        assert_eq!(route, "/jobs/sync/{id}");

        let route_only = OperationMeta::new("delete_job", noop)
            .param(simple("id"))
            .route("/{id}");
        let (verbs, route) = resolve(&route_only, Some("jobs"), RouteStyle::Compact).unwrap();
        assert_eq!(verbs, vec![HttpMethod::DELETE]);
        assert_eq!(route, "/jobs/{id}");

        let bad = OperationMeta::new("sync", noop).method("FETCH");
        assert!(matches!(
            resolve(&bad, None, RouteStyle::Compact),
            Err(DiscoveryError::UnknownMethod { .. })
        ));
    }
}
