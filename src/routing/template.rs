//! URI templates.
//!
//! # Syntax
//! - `/users`: literal segments, compared case-sensitively
//! - `/users/{id}`: `{name}` captures exactly one non-empty segment
//! - `/files/{*path}`: `{*name}` as the last segment captures the rest
//!
//! # Design Decisions
//! - Templates are parsed once at registration
//! - Matching walks segments left to right with no backtracking
//! - Captured values are percent-decoded as UTF-8

use std::fmt;

use percent_encoding::percent_decode_str;

use crate::http::request::UriParameters;
use crate::routing::error::{RouteError, RouteResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Rest(String),
}

/// A parsed URI pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    pattern: String,
    segments: Vec<Segment>,
}

impl UriTemplate {
    pub fn parse(pattern: &str) -> RouteResult<Self> {
        let invalid = |reason: &str| RouteError::InvalidTemplate {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let Some(body) = pattern.strip_prefix('/') else {
            return Err(invalid("must start with '/'"));
        };

        let raw: Vec<&str> = body.split('/').collect();
        let mut segments = Vec::with_capacity(raw.len());
        let mut names: Vec<&str> = Vec::new();

        for (i, seg) in raw.iter().enumerate() {
            let segment = match seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(inner) => {
                    let (name, rest) = match inner.strip_prefix('*') {
                        Some(name) => (name, true),
                        None => (inner, false),
                    };
                    if name.is_empty() || name.contains(['{', '}', '*']) {
                        return Err(invalid("placeholder needs a plain name"));
                    }
                    if names.contains(&name) {
                        return Err(invalid("duplicate placeholder name"));
                    }
                    names.push(name);
                    if rest {
                        if i != raw.len() - 1 {
                            return Err(invalid("catch-all placeholder must be the last segment"));
                        }
                        Segment::Rest(name.to_string())
                    } else {
                        Segment::Param(name.to_string())
                    }
                }
                None if seg.contains(['{', '}']) => {
                    return Err(invalid("placeholder must span a whole segment"));
                }
                None => Segment::Literal(seg.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Match a request path (no query), returning captured values.
    pub fn matches(&self, path: &str) -> Option<UriParameters> {
        let mut parts = path.strip_prefix('/')?.split('/');
        let mut params = UriParameters::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => {
                    if parts.next()? != literal {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.next()?;
                    if value.is_empty() {
                        return None;
                    }
                    params.insert(name.as_str(), decode(value));
                }
                Segment::Rest(name) => {
                    let rest: Vec<&str> = parts.by_ref().collect();
                    params.insert(name.as_str(), decode(&rest.join("/")));
                }
            }
        }

        match parts.next() {
            Some(_) => None,
            None => Some(params),
        }
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

fn decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}
