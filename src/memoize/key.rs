//! Cache key derivation.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Prefix shared by every key the decorator writes.
pub const KEY_NAMESPACE: &str = "cachual";

/// Longest identity label kept readable in a key.
pub const MAX_LABEL_LENGTH: usize = 64;

/// Upper bound on the length of any derived key.
pub const MAX_DERIVED_KEY_LENGTH: usize = KEY_NAMESPACE.len() + MAX_LABEL_LENGTH + 2 + 64;

// == Call Arguments ==
/// Positional and keyword arguments of a memoized call.
///
/// Positional arguments keep their order; keyword arguments are keyed by name,
/// so the order in which they were added does not affect the cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallArgs {
    args: Vec<Value>,
    kwargs: BTreeMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Sets a keyword argument, replacing an earlier one with the same name.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &BTreeMap<String, Value> {
        &self.kwargs
    }

    pub fn kwarg_value(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }
}

// == Cache Key ==
/// `cachual:<label>:<sha256 of identity and JSON-encoded arguments>`.
///
/// The label is the identity restricted to `[A-Za-z0-9:._-]` and cut to
/// [`MAX_LABEL_LENGTH`] bytes; the digest covers the full identity. Keys are
/// therefore printable ASCII without whitespace and never longer than
/// [`MAX_DERIVED_KEY_LENGTH`], whatever the identity.
///
/// Arguments must serialize deterministically: maps with unstable iteration
/// order such as `HashMap` can yield different keys for equal arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for calling `identity` with `args`.
    pub fn derive<A: Serialize + ?Sized>(identity: &str, args: &A) -> Result<Self> {
        let encoded = serde_json::to_vec(args)?;

        let mut hasher = Sha256::new();
        hasher.update(identity.as_bytes());
        hasher.update([0u8]);
        hasher.update(&encoded);
        let digest = hex::encode(hasher.finalize());

        Ok(Self(format!("{}:{}:{}", KEY_NAMESPACE, label(identity), digest)))
    }

    /// This key if it is at most `max_len` bytes, otherwise
    /// `cachual:<sha256 of the key>`.
    pub fn fit_to(&self, max_len: usize) -> Cow<'_, str> {
        if self.0.len() <= max_len {
            return Cow::Borrowed(&self.0);
        }
        let digest = hex::encode(Sha256::digest(self.0.as_bytes()));
        Cow::Owned(format!("{}:{}", KEY_NAMESPACE, digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn label(identity: &str) -> String {
    identity
        .chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | ':' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .take(MAX_LABEL_LENGTH)
        .collect()
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
