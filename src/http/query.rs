//! Query string decoding.
//!
//! # Responsibilities
//! - Locate the query component of a request URI
//! - Split `key=value` pairs on `&`, keeping repeated keys in order
//! - Percent-decode keys and values with the request charset
//!
//! # Design Decisions
//! - Form semantics: `+` decodes to a space
//! - A pair without `=` has an empty value; pairs with an empty key are skipped
//! - Malformed escapes are kept literally and invalid text is decoded lossily,
//!   so decoding never fails

use percent_encoding::percent_decode_str;

use crate::http::charset::Charset;

/// Decoded query parameters, keyed case-sensitively, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParameters {
    entries: Vec<(String, Vec<String>)>,
}

impl QueryParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the query component of `uri`, if any.
    pub fn from_uri(uri: &str, charset: Charset) -> Self {
        match query_component(uri) {
            Some(query) => Self::parse(query, charset),
            None => Self::new(),
        }
    }

    /// Decode a raw query string (without the leading `?`).
    pub fn parse(query: &str, charset: Charset) -> Self {
        let mut params = Self::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            if key.is_empty() {
                continue;
            }
            params.append(decode_component(key, charset), decode_component(value, charset));
        }
        params
    }

    pub fn append(&mut self, key: String, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    /// All values for `key`, in the order they appeared.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The part of `uri` between `?` and an optional `#`.
pub(crate) fn query_component(uri: &str) -> Option<&str> {
    let before_fragment = uri.split_once('#').map(|(u, _)| u).unwrap_or(uri);
    let (_, query) = before_fragment.split_once('?')?;
    Some(query)
}

fn decode_component(raw: &str, charset: Charset) -> String {
    let spaced = raw.replace('+', " ");
    let bytes: Vec<u8> = percent_decode_str(&spaced).collect();
    charset.decode_lossy(&bytes)
}
