//! Text encodings understood by the pipeline.
//!
//! HTTP bodies and query strings are decoded either as UTF-8 or as
//! ISO-8859-1, the historical HTTP default.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::http::error::{HttpError, HttpResult};

/// Character set used to turn bytes into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum Charset {
    #[default]
    #[serde(rename = "utf-8", alias = "utf8", alias = "UTF-8")]
    Utf8,
    #[serde(rename = "iso-8859-1", alias = "latin1", alias = "ISO-8859-1")]
    Latin1,
}

impl Charset {
    /// Decode bytes strictly; malformed input is an error.
    pub fn decode(&self, bytes: &[u8]) -> HttpResult<String> {
        match self {
            Charset::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|_| HttpError::Decode { charset: *self }),
            // Every byte is a valid ISO-8859-1 code point.
            Charset::Latin1 => Ok(bytes.iter().copied().map(char::from).collect()),
        }
    }

    /// Decode bytes, replacing malformed sequences with U+FFFD.
    pub fn decode_lossy(&self, bytes: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Charset::Latin1 => bytes.iter().copied().map(char::from).collect(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Latin1 => "ISO-8859-1",
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Charset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Charset::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin1" => Ok(Charset::Latin1),
            other => Err(format!("unsupported charset: {other}")),
        }
    }
}
