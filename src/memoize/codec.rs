//! Pack/unpack functions converting results to and from stored strings.
//!
//! A custom pair should be mutual inverses (`unpack(pack(v)) == v`);
//! otherwise cache hits return something other than what the function
//! produced. This is not checked at runtime.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Turns a computed value into its stored form.
pub type PackFn<R> = Arc<dyn Fn(&R) -> Result<String> + Send + Sync>;

/// Rebuilds a value from its stored form.
pub type UnpackFn<R> = Arc<dyn Fn(&str) -> Result<R> + Send + Sync>;

/// JSON encoding, the default pack.
pub fn json_pack<R: Serialize + 'static>() -> PackFn<R> {
    Arc::new(|value: &R| -> Result<String> { Ok(serde_json::to_string(value)?) })
}

/// JSON decoding, the default unpack.
pub fn json_unpack<R: DeserializeOwned + 'static>() -> UnpackFn<R> {
    Arc::new(|raw: &str| -> Result<R> { Ok(serde_json::from_str(raw)?) })
}

/// Stores strings as-is.
pub fn identity_pack() -> PackFn<String> {
    Arc::new(|value: &String| -> Result<String> { Ok(value.clone()) })
}

/// Returns stored strings as-is.
pub fn identity_unpack() -> UnpackFn<String> {
    Arc::new(|raw: &str| -> Result<String> { Ok(raw.to_string()) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Report {
        month: u8,
        totals: Vec<f64>,
    }

    #[test]
    fn test_json_round_trip() {
        let report = Report {
            month: 5,
            totals: vec![1.5, 2.25],
        };
        let packed = json_pack::<Report>()(&report).unwrap();

        assert_eq!(packed, r#"{"month":5,"totals":[1.5,2.25]}"#);
        assert_eq!(json_unpack::<Report>()(&packed).unwrap(), report);
    }

    #[test]
    fn test_json_unpack_rejects_garbage() {
        let result = json_unpack::<Report>()("not json");
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }

    #[test]
    fn test_identity_codec() {
        let packed = identity_pack()(&"plain text".to_string()).unwrap();
        assert_eq!(packed, "plain text");
        assert_eq!(identity_unpack()(&packed).unwrap(), "plain text");
    }
}
