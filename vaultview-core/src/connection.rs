//! Database connection string fetched from the vault.

use std::fmt;

/// An opaque connection string.
///
/// Fetched once at startup and never mutated. `Debug` and `Display` redact
/// the value so it cannot end up in logs by accident; call [`expose`] to
/// get at the raw string.
///
/// [`expose`]: ConnectionString::expose
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString(String);

impl ConnectionString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, credentials included.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConnectionString(<redacted>)")
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}
