// Routing of HTTP requests to catalog endpoints

use crate::catalog::{EndpointCatalog, EndpointDescriptor};
use crate::http::decode_component;
use crate::logging::{debug, warn};
use crate::HttpMethod;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// One verb of one endpoint
#[derive(Clone)]
pub struct Route {
    pub method: HttpMethod,
    pub template: String,
    segments: Vec<Segment>,
    pub endpoint: Arc<EndpointDescriptor>,
}

impl Route {
    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// Template with literals lower-cased and placeholder names erased, so
    /// `/a/{id}` and `/A/{key}` collide
    fn shape(&self) -> Vec<Option<String>> {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => Some(text.to_lowercase()),
                Segment::Param(_) => None,
            })
            .collect()
    }
}

/// Result of looking up a request
pub enum RouteMatch<'a> {
    Found {
        route: &'a Route,
        params: HashMap<String, String>,
    },
    /// The path exists under other verbs
    MethodNotAllowed { allowed: Vec<HttpMethod> },
    NotFound,
}

/// Router for dispatching requests to endpoints
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// One route per verb of every endpoint in the catalog
    pub fn from_catalog(catalog: &EndpointCatalog) -> Self {
        let mut router = Self::new();
        for endpoint in catalog.iter() {
            for verb in endpoint.verbs() {
                router.add_route(*verb, endpoint.clone());
            }
        }
        router
    }

    /// Add a route; the first registration of a route and verb wins
    pub fn add_route(&mut self, method: HttpMethod, endpoint: Arc<EndpointDescriptor>) -> bool {
        let template = endpoint.route().to_string();
        let route = Route {
            method,
            segments: parse_template(&template),
            template,
            endpoint,
        };

        if let Some(existing) = self
            .routes
            .iter()
            .find(|r| r.method == method && r.shape() == route.shape())
        {
            warn!(
                method = %method,
                route = %route.template,
                kept = existing.endpoint.operation().name(),
                dropped = route.endpoint.operation().name(),
                "Duplicate route, keeping the first registration"
            );
            return false;
        }

        debug!(method = %method, route = %route.template, "Route registered");
        self.routes.push(route);
        true
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the route serving `method` and `path` (path without query).
    ///
    /// Among matching templates the one with more literal segments wins.
    pub fn lookup(&self, method: &str, path: &str) -> RouteMatch<'_> {
        let verb = HttpMethod::from_str(method);
        let mut best: Option<(&Route, HashMap<String, String>)> = None;
        let mut allowed = Vec::new();

        for route in &self.routes {
            let Some(params) = match_path(&route.segments, path) else {
                continue;
            };
            if Some(route.method) != verb {
                if !allowed.contains(&route.method) {
                    allowed.push(route.method);
                }
                continue;
            }
            let better = best
                .as_ref()
                .is_none_or(|(current, _)| route.literal_count() > current.literal_count());
            if better {
                best = Some((route, params));
            }
        }

        match best {
            Some((route, params)) => RouteMatch::Found { route, params },
            None if !allowed.is_empty() => {
                allowed.sort();
                RouteMatch::MethodNotAllowed { allowed }
            }
            None => RouteMatch::NotFound,
        }
    }
}

fn parse_template(template: &str) -> Vec<Segment> {
    template
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            match segment
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
            {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(segment.to_string()),
            }
        })
        .collect()
}

/// Match a request path against template segments.
/// Literals compare case-insensitively; parameters are percent-decoded.
fn match_path(segments: &[Segment], path: &str) -> Option<HashMap<String, String>> {
    let path_parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if segments.len() != path_parts.len() {
        return None;
    }

    let mut params = HashMap::new();

    for (segment, part) in segments.iter().zip(path_parts) {
        match segment {
            Segment::Param(name) => {
                params.insert(name.clone(), decode_component(part));
            }
            Segment::Literal(literal) => {
                if !decode_component(part).eq_ignore_ascii_case(literal) {
                    return None;
                }
            }
        }
    }

    Some(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(template: &str) -> Vec<Segment> {
        parse_template(template)
    }

    #[test]
    fn test_match_path_static() {
        let params = match_path(&segments("/users"), "/users").unwrap();
        assert!(params.is_empty());
    }

    #[test]
    fn test_match_path_is_case_insensitive_for_literals() {
        assert!(match_path(&segments("/api/getuserbyid/{id}"), "/API/GetUserById/3").is_some());
    }

    #[test]
    fn test_match_path_with_param() {
        let params = match_path(&segments("/users/{id}"), "/users/123").unwrap();
        assert_eq!(params.get("id"), Some(&"123".to_string()));
    }

    #[test]
    fn test_match_path_decodes_params() {
        let params = match_path(&segments("/files/{name}"), "/files/a%20b.txt").unwrap();
        assert_eq!(params.get("name"), Some(&"a b.txt".to_string()));
    }

    #[test]
    fn test_match_path_no_match() {
        assert!(match_path(&segments("/users/{id}"), "/posts/123").is_none());
        assert!(match_path(&segments("/users/{id}"), "/users").is_none());
    }

    #[test]
    fn test_match_path_root_and_trailing_slash() {
        assert!(match_path(&segments("/"), "/").is_some());
        assert!(match_path(&segments("/users"), "/users/").is_some());
    }
}
