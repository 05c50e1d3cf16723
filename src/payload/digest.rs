//! Content digest: a deterministic fingerprint of logical tensor content,
//! independent of container encoding or compression.
//!
//! Accumulation order is part of the contract: the same keys traversed in
//! a different order produce a different digest. NaN/Inf are hashed as
//! their raw bit patterns.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use super::errors::{PayloadError, PayloadResult};
use super::types::{render_shape, PayloadView, Tensor};

/// Digest of a single tensor: dtype tag + canonical shape + raw bytes.
///
/// The raw bytes are contiguous row-major by `Tensor` construction; a
/// strided source must be materialized before it can become a `Tensor`.
pub fn tensor_digest(tensor: &Tensor) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tensor.dtype().tag().as_bytes());
    hasher.update(render_shape(tensor.shape()).as_bytes());
    hasher.update(tensor.data());
    format!("{:x}", hasher.finalize())
}

/// Digest of a whole payload traversed in `key_order`.
///
/// `key_order` must cover the payload exactly: a key listed but absent, or
/// present but unlisted, is a schema error and nothing is hashed.
pub fn content_digest<P: PayloadView>(payload: &P, key_order: &[String]) -> PayloadResult<String> {
    let listed: HashSet<&str> = key_order.iter().map(|k| k.as_str()).collect();
    if listed.len() != key_order.len() {
        return Err(PayloadError::Schema(
            "duplicate key in key order".to_string(),
        ));
    }
    for key in payload.keys() {
        if !listed.contains(key) {
            return Err(PayloadError::Schema(format!(
                "payload key not in key order: {}",
                key
            )));
        }
    }

    let mut hasher = Sha256::new();
    for key in key_order {
        let tensor = payload.tensor(key).ok_or_else(|| {
            PayloadError::Schema(format!("key order names missing key: {}", key))
        })?;
        let inner = tensor_digest(tensor);
        hasher.update(key.as_bytes());
        hasher.update(inner.as_bytes());
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::types::{DType, Payload};

    fn key_order(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn two_key_payload() -> Payload {
        let mut p = Payload::new();
        p.insert("w", Tensor::from_f64(vec![2, 2], &[0.1, 0.2, 0.3, 0.4]).unwrap());
        p.insert("b", Tensor::from_f64(vec![2], &[0.5, 0.6]).unwrap());
        p
    }

    #[test]
    fn test_digest_deterministic() {
        let p = two_key_payload();
        let order = key_order(&["w", "b"]);
        assert_eq!(
            content_digest(&p, &order).unwrap(),
            content_digest(&p, &order).unwrap()
        );
    }

    #[test]
    fn test_digest_sensitive_to_one_bit() {
        let p = two_key_payload();
        let order = key_order(&["w", "b"]);
        let clean = content_digest(&p, &order).unwrap();

        let mut flipped = two_key_payload();
        {
            let t = flipped.tensor("w").unwrap().clone();
            let mut data = t.data().to_vec();
            data[0] ^= 0x01;
            flipped.insert("w", Tensor::new(DType::F64, vec![2, 2], data).unwrap());
        }

        assert_ne!(clean, content_digest(&flipped, &order).unwrap());
    }

    #[test]
    fn test_digest_depends_on_key_order() {
        let p = two_key_payload();
        let a = content_digest(&p, &key_order(&["w", "b"])).unwrap();
        let b = content_digest(&p, &key_order(&["b", "w"])).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_digest_depends_on_shape_not_just_bytes() {
        let flat = {
            let mut p = Payload::new();
            p.insert("w", Tensor::from_f64(vec![4], &[0.1, 0.2, 0.3, 0.4]).unwrap());
            p
        };
        let square = {
            let mut p = Payload::new();
            p.insert("w", Tensor::from_f64(vec![2, 2], &[0.1, 0.2, 0.3, 0.4]).unwrap());
            p
        };
        let order = key_order(&["w"]);
        assert_ne!(
            content_digest(&flat, &order).unwrap(),
            content_digest(&square, &order).unwrap()
        );
    }

    #[test]
    fn test_digest_hashes_nan_bit_patterns() {
        let mut p = Payload::new();
        p.insert("w", Tensor::from_f64(vec![1], &[f64::NAN]).unwrap());
        // NaN payloads still digest; the scanner flags them separately.
        assert!(content_digest(&p, &key_order(&["w"])).is_ok());
    }

    #[test]
    fn test_digest_missing_key_is_schema_error() {
        let p = two_key_payload();
        let err = content_digest(&p, &key_order(&["w", "b", "extra"])).unwrap_err();
        assert!(err.to_string().contains("schema error"));
    }

    #[test]
    fn test_digest_extra_payload_key_is_schema_error() {
        let p = two_key_payload();
        assert!(content_digest(&p, &key_order(&["w"])).is_err());
    }

    #[test]
    fn test_digest_duplicate_key_order_rejected() {
        let p = two_key_payload();
        assert!(content_digest(&p, &key_order(&["w", "b", "w"])).is_err());
    }
}
