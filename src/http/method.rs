//! HTTP request methods.

use std::fmt;
use std::str::FromStr;

/// Request method. Matching is an exact comparison of variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
    Connect,
}

impl Method {
    const ALL: [Method; 9] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Patch,
        Method::Head,
        Method::Options,
        Method::Trace,
        Method::Connect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
        }
    }

    /// Derive a method from a handler name such as `get_user`, `postComment`
    /// or `DELETE_USER`.
    ///
    /// The name must start with a verb, compared case-insensitively, followed
    /// by the end of the name, `_`, or an uppercase letter.
    pub fn from_handler_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| {
            let verb = method.as_str();
            let Some(prefix) = name.get(..verb.len()) else {
                return false;
            };
            let rest = &name[verb.len()..];
            prefix.eq_ignore_ascii_case(verb)
                && rest
                    .chars()
                    .next()
                    .map_or(true, |c| c == '_' || c.is_ascii_uppercase())
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for method names outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "TRACE" => Ok(Method::Trace),
            "CONNECT" => Ok(Method::Connect),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}
