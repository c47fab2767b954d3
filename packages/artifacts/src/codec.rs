//! `MessagePack` encoding of artifact values.
//!
//! Named-field encoding keeps blobs readable by later versions that add
//! optional fields. Integer map keys (hours, weekdays) are stored as
//! integers, not strings.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{ArtifactError, ArtifactKey};

/// Encodes `value` for storage under `key`.
///
/// # Errors
///
/// Returns [`ArtifactError::Encode`] if serialization fails.
pub fn encode<T: Serialize>(key: &ArtifactKey, value: &T) -> Result<Vec<u8>, ArtifactError> {
    rmp_serde::to_vec_named(value).map_err(|e| ArtifactError::Encode {
        key: *key,
        message: e.to_string(),
    })
}

/// Decodes a blob read from `key`.
///
/// # Errors
///
/// Returns [`ArtifactError::Corrupt`] if the blob is not a valid encoding
/// of `T`.
pub fn decode<T: DeserializeOwned>(key: &ArtifactKey, bytes: &[u8]) -> Result<T, ArtifactError> {
    rmp_serde::from_slice(bytes).map_err(|e| ArtifactError::Corrupt {
        key: *key,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn integer_keyed_maps_survive() {
        let key = ArtifactKey::summaries(6, 2013);
        let mut by_hour: BTreeMap<u8, BTreeMap<String, u64>> =
            (0..24).map(|h| (h, BTreeMap::new())).collect();
        by_hour
            .get_mut(&23)
            .unwrap()
            .insert("Larceny".to_string(), 4);

        let bytes = encode(&key, &by_hour).unwrap();
        let decoded: BTreeMap<u8, BTreeMap<String, u64>> = decode(&key, &bytes).unwrap();
        assert_eq!(decoded, by_hour);
        assert_eq!(decoded.len(), 24);
    }

    #[test]
    fn garbage_is_corrupt() {
        let key = ArtifactKey::averages(6, 2013);
        let err = decode::<BTreeMap<String, f64>>(&key, b"\xc1not msgpack").unwrap_err();
        assert!(matches!(err, ArtifactError::Corrupt { key: k, .. } if k == key));
    }
}
