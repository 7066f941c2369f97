//! Method + pattern router
//!
//! Routes are tried in registration order and the first one whose method filter
//! and pattern both accept the request wins.

use hyper::Method;
use std::fmt;

use super::pattern::{Params, Pattern};
use crate::error::RouterError;

/// Which methods a route accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    One(Method),
    Any,
}

impl MethodFilter {
    pub fn allows(&self, method: &Method) -> bool {
        match self {
            Self::One(m) => m == method,
            Self::Any => true,
        }
    }
}

impl fmt::Display for MethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(m) => write!(f, "{m}"),
            Self::Any => f.write_str("*"),
        }
    }
}

impl From<Method> for MethodFilter {
    fn from(method: Method) -> Self {
        Self::One(method)
    }
}

struct Route<H> {
    method: MethodFilter,
    pattern: Pattern,
    handler: H,
}

/// Result of a successful match
#[derive(Debug)]
pub struct RouteMatch<'a, H> {
    pub handler: &'a H,
    pub params: Params,
    /// Pattern the request matched, e.g. `/record/:name`
    pub pattern: &'a str,
}

pub struct Router<H> {
    routes: Vec<Route<H>>,
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Router<H> {
    pub const fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a route. A second route with the same method filter and the
    /// same pattern shape is rejected.
    pub fn register(
        &mut self,
        method: impl Into<MethodFilter>,
        pattern: &str,
        handler: H,
    ) -> Result<(), RouterError> {
        let method = method.into();
        let pattern = Pattern::parse(pattern)?;

        if self
            .routes
            .iter()
            .any(|r| r.method == method && r.pattern.same_shape(&pattern))
        {
            return Err(RouterError::DuplicateRoute {
                method: method.to_string(),
                pattern: pattern.as_str().to_string(),
            });
        }

        tracing::debug!(%method, pattern = pattern.as_str(), "route registered");
        self.routes.push(Route {
            method,
            pattern,
            handler,
        });
        Ok(())
    }

    pub fn get(&mut self, pattern: &str, handler: H) -> Result<(), RouterError> {
        self.register(Method::GET, pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: H) -> Result<(), RouterError> {
        self.register(Method::POST, pattern, handler)
    }

    pub fn any(&mut self, pattern: &str, handler: H) -> Result<(), RouterError> {
        self.register(MethodFilter::Any, pattern, handler)
    }

    /// Find the earliest registered route accepting `method` and `path`
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, H>> {
        self.routes
            .iter()
            .filter(|route| route.method.allows(method))
            .find_map(|route| {
                route.pattern.match_path(path).map(|params| RouteMatch {
                    handler: &route.handler,
                    params,
                    pattern: route.pattern.as_str(),
                })
            })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_router() -> Router<&'static str> {
        let mut router = Router::new();
        router.post("/record/:name", "record").unwrap();
        router.get("/value/:name", "value").unwrap();
        router.get("/ping", "ping").unwrap();
        router.any("/timeout", "timeout").unwrap();
        router
    }

    #[test]
    fn test_match_extracts_params() {
        let router = stats_router();
        let m = router.match_route(&Method::POST, "/record/requests").unwrap();
        assert_eq!(*m.handler, "record");
        assert_eq!(m.params.get("name"), Some("requests"));
        assert_eq!(m.pattern, "/record/:name");
    }

    #[test]
    fn test_wrong_method_is_unmatched() {
        let router = stats_router();
        assert!(router.match_route(&Method::GET, "/record/requests").is_none());
        assert!(router.match_route(&Method::POST, "/ping").is_none());
    }

    #[test]
    fn test_unknown_path_is_unmatched() {
        let router = stats_router();
        assert!(router.match_route(&Method::GET, "/values/x").is_none());
        assert!(router.match_route(&Method::GET, "/value/x/y").is_none());
    }

    #[test]
    fn test_any_method_route() {
        let router = stats_router();
        for method in [Method::GET, Method::POST, Method::DELETE, Method::PUT] {
            let m = router.match_route(&method, "/timeout").unwrap();
            assert_eq!(*m.handler, "timeout");
        }
    }

    #[test]
    fn test_earliest_registration_wins() {
        let mut router = Router::new();
        router.get("/value/:name", "param").unwrap();
        router.get("/value/total", "literal").unwrap();
        router.any("/value/:name", "any").unwrap();

        let m = router.match_route(&Method::GET, "/value/total").unwrap();
        assert_eq!(*m.handler, "param");

        let m = router.match_route(&Method::POST, "/value/total").unwrap();
        assert_eq!(*m.handler, "any");
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut router = Router::new();
        router.get("/value/:name", 1).unwrap();
        let err = router.get("/value/:other", 2).unwrap_err();
        assert_eq!(
            err,
            RouterError::DuplicateRoute {
                method: "GET".to_string(),
                pattern: "/value/:other".to_string(),
            }
        );
        // Same pattern under another method is fine
        router.post("/value/:name", 3).unwrap();
        assert_eq!(router.len(), 2);
    }
}
