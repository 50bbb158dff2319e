//! HTTP headers handling
//!
//! This module provides an ordered header list with case-insensitive
//! lookups, and the request normalization applied before anything is sent.

use super::{Error, Method, Result, DEFAULT_CONTENT_TYPE};
use std::fmt;

/// HTTP headers collection
///
/// Headers are stored in insertion order (for responses, the order they
/// were received in) and support:
/// - Case-insensitive header name lookups
/// - Multiple values for the same header name
/// - Iteration over all headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: Vec<(String, String)>,
}

impl Headers {
    /// Create a new empty headers collection
    pub const fn new() -> Self {
        Headers {
            headers: Vec::new(),
        }
    }

    /// Append a header
    ///
    /// An existing header with the same name is kept; this adds another
    /// value after it.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Get the first value for a header (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get all values for a header (case-insensitive)
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Count how many times a header appears
    pub fn count(&self, name: &str) -> usize {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .count()
    }

    /// Check if a header exists
    pub fn contains(&self, name: &str) -> bool {
        self.headers
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Check if any header with this name (case-insensitive) has exactly
    /// this value
    pub fn contains_value(&self, name: &str, value: &str) -> bool {
        self.headers
            .iter()
            .any(|(n, v)| n.eq_ignore_ascii_case(name) && v == value)
    }

    /// Get the number of headers
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if there are no headers
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Clear all headers
    pub fn clear(&mut self) {
        self.headers.clear();
    }

    /// Iterate over all headers
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Apply the request defaults for `method`.
    ///
    /// For submission methods (POST, PUT) without a `Content-Type` header, a
    /// form content type is appended, followed by a `Content-Length`
    /// matching `body` (`0` when absent) unless one is already present.
    /// Running this again on its own output changes nothing.
    pub fn normalize(&mut self, method: &Method, body: Option<&[u8]>) {
        if !method.is_submission() || self.contains("Content-Type") {
            return;
        }

        self.insert("Content-Type", DEFAULT_CONTENT_TYPE);
        if !self.contains("Content-Length") {
            let length = body.map_or(0, <[u8]>::len);
            self.insert("Content-Length", length.to_string());
        }
    }

    /// Parse a header line into name and value
    ///
    /// The line is split on its first colon; both halves are trimmed.
    pub fn parse_header_line(line: &str) -> Result<(String, String)> {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::InvalidHeader("Empty header name".to_string()));
            }

            Ok((name.to_string(), value.trim().to_string()))
        } else {
            Err(Error::InvalidHeader(format!("No colon in header: {}", line)))
        }
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.headers {
            writeln!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}

impl From<Vec<(String, String)>> for Headers {
    fn from(headers: Vec<(String, String)>) -> Self {
        Headers { headers }
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}
