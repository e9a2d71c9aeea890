//! Ordered `key=value` parameter lists for spaces, builds, and queries

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// An ordered sequence of `key=value` tokens.
///
/// Spaces, index builds, and query-time tuning all take their configuration
/// in this form; the engine decides which keys it understands.
#[derive(Debug, Clone, Default)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    /// An empty parameter list.
    pub fn empty() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Parse a sequence of `key=value` tokens, preserving order.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<Self> {
        let mut pairs = Vec::with_capacity(tokens.len());
        for token in tokens {
            let token = token.as_ref();
            match token.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    pairs.push((key.to_string(), value.to_string()));
                }
                _ => {
                    return Err(Error::Configuration(format!(
                        "malformed parameter {token:?}: expected key=value"
                    )));
                }
            }
        }
        Ok(Self { pairs })
    }

    /// Look up the last value set for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Look up `key` and parse its value, failing with a configuration
    /// error that names the key on a parse failure.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
                Error::Configuration(format!(
                    "parameter {key}={raw} cannot be parsed as {}",
                    std::any::type_name::<T>()
                ))
            }),
        }
    }

    /// Reject any key outside `allowed`.
    pub fn expect_known(&self, context: &str, allowed: &[&str]) -> Result<()> {
        for (key, _) in &self.pairs {
            if !allowed.contains(&key.as_str()) {
                return Err(Error::Configuration(format!(
                    "unknown {context} parameter {key:?}: supported parameters are {allowed:?}"
                )));
            }
        }
        Ok(())
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.pairs.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}
