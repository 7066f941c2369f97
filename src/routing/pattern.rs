//! Route pattern module
//!
//! A pattern is a `/`-separated list of segments. Segments starting with `:`
//! capture the corresponding path segment under that name.

use crate::error::RouterError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Parameters captured while matching a path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: Vec<(String, String)>,
}

impl Params {
    /// Look up a parameter; `"name"` and `":name"` are equivalent
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.strip_prefix(':').unwrap_or(name);
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.strip_prefix('/').unwrap_or(path).split('/')
}

impl Pattern {
    pub fn parse(raw: &str) -> Result<Self, RouterError> {
        let invalid = |reason| RouterError::InvalidPattern {
            pattern: raw.to_string(),
            reason,
        };

        if !raw.starts_with('/') {
            return Err(invalid("pattern must start with '/'"));
        }

        let mut segments = Vec::new();
        for part in split_path(raw) {
            let segment = match part.strip_prefix(':') {
                Some("") => return Err(invalid("parameter name is empty")),
                Some(name) => {
                    if segments.contains(&Segment::Param(name.to_string())) {
                        return Err(invalid("parameter name bound twice"));
                    }
                    Segment::Param(name.to_string())
                }
                None => Segment::Literal(part.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when both patterns accept exactly the same paths
    pub fn same_shape(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Param(_), Segment::Param(_)) => true,
                    _ => false,
                })
    }

    /// Match a request path, returning captured parameters on success
    pub fn match_path(&self, path: &str) -> Option<Params> {
        let mut params = Params::default();
        let mut parts = split_path(path);

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Param(name) if !part.is_empty() => {
                    params.values.push((name.clone(), part.to_string()));
                }
                _ => return None,
            }
        }

        // Segment counts must be equal
        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_match() {
        let pattern = Pattern::parse("/ping").unwrap();
        assert_eq!(pattern.match_path("/ping"), Some(Params::default()));
        assert!(pattern.match_path("/pong").is_none());
        assert!(pattern.match_path("/ping/").is_none());
        assert!(pattern.match_path("/ping/extra").is_none());
    }

    #[test]
    fn test_param_capture() {
        let pattern = Pattern::parse("/record/:name").unwrap();
        let params = pattern.match_path("/record/requests").unwrap();
        assert_eq!(params.get("name"), Some("requests"));
        assert_eq!(params.get(":name"), Some("requests"));
        assert_eq!(params.get("other"), None);
    }

    #[test]
    fn test_param_requires_non_empty_segment() {
        let pattern = Pattern::parse("/record/:name").unwrap();
        assert!(pattern.match_path("/record/").is_none());
        assert!(pattern.match_path("/record").is_none());
    }

    #[test]
    fn test_multiple_params() {
        let pattern = Pattern::parse("/org/:org/user/:id").unwrap();
        let params = pattern.match_path("/org/acme/user/42").unwrap();
        assert_eq!(params.get("org"), Some("acme"));
        assert_eq!(params.get("id"), Some("42"));
        assert!(pattern.match_path("/org/acme/team/42").is_none());
    }

    #[test]
    fn test_root_pattern() {
        let pattern = Pattern::parse("/").unwrap();
        assert!(pattern.match_path("/").is_some());
        assert!(pattern.match_path("/a").is_none());
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(
            Pattern::parse("record/:name"),
            Err(RouterError::InvalidPattern { .. })
        ));
        assert!(matches!(
            Pattern::parse("/record/:"),
            Err(RouterError::InvalidPattern { .. })
        ));
        assert!(matches!(
            Pattern::parse("/a/:id/b/:id"),
            Err(RouterError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_same_shape_ignores_param_names() {
        let a = Pattern::parse("/value/:name").unwrap();
        let b = Pattern::parse("/value/:key").unwrap();
        let c = Pattern::parse("/value/total").unwrap();
        assert!(a.same_shape(&b));
        assert!(!a.same_shape(&c));
    }
}
