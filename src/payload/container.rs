//! Container codecs: the byte-level encodings a payload travels in.
//!
//! Two formats exist, selected by trial-and-error on load so the scanner
//! never needs to be told which writer produced a file:
//! - binary (`.tbin`, magic `CKB1`): compact length-prefixed entries;
//! - JSON (`.tjson`): serde document with base64-encoded element bytes.
//!
//! The content digest is computed over decoded tensors, never over these
//! bytes, so the two encodings of one payload share a digest while having
//! different file hashes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::errors::{PayloadError, PayloadResult};
use super::types::{render_shape, DType, Payload, PayloadView, Tensor};

const BINARY_MAGIC: &[u8; 4] = b"CKB1";

/// Supported container encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Binary,
    Json,
}

impl ContainerFormat {
    /// Checkpoint file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::Binary => "tbin",
            ContainerFormat::Json => "tjson",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "tbin" => Some(ContainerFormat::Binary),
            "tjson" => Some(ContainerFormat::Json),
            _ => None,
        }
    }

    /// Serializes a payload in this format. Keys are written in the
    /// payload's stored order, which is deterministic.
    pub fn encode<P: PayloadView>(&self, payload: &P) -> PayloadResult<Vec<u8>> {
        match self {
            ContainerFormat::Binary => encode_binary(payload),
            ContainerFormat::Json => encode_json(payload),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> PayloadResult<Payload> {
        match self {
            ContainerFormat::Binary => decode_binary(bytes),
            ContainerFormat::Json => decode_json(bytes),
        }
    }
}

/// Decodes container bytes by trying each known format in turn.
///
/// Returns the payload and the format that succeeded. A file that no
/// format accepts yields a decode error whose kind names the failure of
/// the most plausible candidate.
pub fn load_auto(bytes: &[u8]) -> PayloadResult<(Payload, ContainerFormat)> {
    match decode_binary(bytes) {
        Ok(payload) => return Ok((payload, ContainerFormat::Binary)),
        Err(err) if bytes.starts_with(BINARY_MAGIC) => {
            // Magic matched: this was a (possibly damaged) binary container,
            // do not fall through and misreport it as bad JSON.
            return Err(err);
        }
        Err(_) => {}
    }
    match decode_json(bytes) {
        Ok(payload) => Ok((payload, ContainerFormat::Json)),
        Err(err) => Err(err),
    }
}

// ---- binary format ----

fn encode_binary<P: PayloadView>(payload: &P) -> PayloadResult<Vec<u8>> {
    let keys = payload.keys();
    let mut out = Vec::new();
    out.extend_from_slice(BINARY_MAGIC);
    out.extend_from_slice(&(keys.len() as u32).to_le_bytes());

    for key in keys {
        let tensor = payload
            .tensor(key)
            .ok_or_else(|| PayloadError::Encode(format!("key vanished during encode: {}", key)))?;
        if key.len() > u16::MAX as usize {
            return Err(PayloadError::Encode(format!("key too long: {}", key)));
        }
        out.extend_from_slice(&(key.len() as u16).to_le_bytes());
        out.extend_from_slice(key.as_bytes());

        let tag = tensor.dtype().tag();
        out.push(tag.len() as u8);
        out.extend_from_slice(tag.as_bytes());

        out.push(tensor.shape().len() as u8);
        for dim in tensor.shape() {
            out.extend_from_slice(&(*dim as u64).to_le_bytes());
        }

        out.extend_from_slice(&(tensor.data().len() as u64).to_le_bytes());
        out.extend_from_slice(tensor.data());
    }
    Ok(out)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> PayloadResult<&'a [u8]> {
        // n comes from untrusted length fields; the addition must not wrap.
        let end = self.pos.checked_add(n).filter(|end| *end <= self.bytes.len());
        let end = end.ok_or_else(|| {
            PayloadError::decode(
                "truncated",
                format!(
                    "need {} bytes at offset {}, have {}",
                    n,
                    self.pos,
                    self.bytes.len() - self.pos
                ),
            )
        })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_u16(&mut self) -> PayloadResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn take_u32(&mut self) -> PayloadResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn take_u64(&mut self) -> PayloadResult<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn take_u8(&mut self) -> PayloadResult<u8> {
        Ok(self.take(1)?[0])
    }
}

fn decode_binary(bytes: &[u8]) -> PayloadResult<Payload> {
    let mut cur = Cursor { bytes, pos: 0 };

    let magic = cur.take(4)?;
    if magic != BINARY_MAGIC {
        return Err(PayloadError::decode("bad_magic", "not a binary container"));
    }
    let count = cur.take_u32()?;

    let mut payload = Payload::new();
    for _ in 0..count {
        let key_len = cur.take_u16()? as usize;
        let key = std::str::from_utf8(cur.take(key_len)?)
            .map_err(|e| PayloadError::decode("bad_utf8", e.to_string()))?
            .to_string();

        let tag_len = cur.take_u8()? as usize;
        let tag = std::str::from_utf8(cur.take(tag_len)?)
            .map_err(|e| PayloadError::decode("bad_utf8", e.to_string()))?;
        let dtype = DType::from_tag(tag)
            .ok_or_else(|| PayloadError::decode("bad_dtype", format!("unknown tag: {}", tag)))?;

        let ndim = cur.take_u8()? as usize;
        let mut shape = Vec::with_capacity(ndim);
        for _ in 0..ndim {
            shape.push(cur.take_u64()? as usize);
        }
        let elem_bytes = shape
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(*d))
            .and_then(|elems| elems.checked_mul(dtype.size()));
        if elem_bytes.is_none() {
            return Err(PayloadError::decode(
                "bad_shape",
                format!("shape {} overflows addressable size", render_shape(&shape)),
            ));
        }

        let data_len = cur.take_u64()? as usize;
        let data = cur.take(data_len)?.to_vec();

        let tensor = Tensor::new(dtype, shape, data)
            .map_err(|e| PayloadError::decode("bad_tensor", e.to_string()))?;
        payload.insert(key, tensor);
    }

    if cur.pos != bytes.len() {
        return Err(PayloadError::decode(
            "trailing_bytes",
            format!("{} unexpected bytes after last entry", bytes.len() - cur.pos),
        ));
    }
    Ok(payload)
}

// ---- JSON format ----

#[derive(Debug, Serialize, Deserialize)]
struct JsonTensor {
    key: String,
    dtype: String,
    shape: Vec<usize>,
    data_b64: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonContainer {
    format_version: u8,
    tensors: Vec<JsonTensor>,
}

fn encode_json<P: PayloadView>(payload: &P) -> PayloadResult<Vec<u8>> {
    let mut tensors = Vec::new();
    for key in payload.keys() {
        let tensor = payload
            .tensor(key)
            .ok_or_else(|| PayloadError::Encode(format!("key vanished during encode: {}", key)))?;
        tensors.push(JsonTensor {
            key: key.to_string(),
            dtype: tensor.dtype().tag().to_string(),
            shape: tensor.shape().to_vec(),
            data_b64: BASE64.encode(tensor.data()),
        });
    }
    let doc = JsonContainer {
        format_version: 1,
        tensors,
    };
    serde_json::to_vec(&doc).map_err(|e| PayloadError::Encode(e.to_string()))
}

fn decode_json(bytes: &[u8]) -> PayloadResult<Payload> {
    let doc: JsonContainer = serde_json::from_slice(bytes)
        .map_err(|e| PayloadError::decode("bad_json", e.to_string()))?;

    let mut payload = Payload::new();
    for entry in doc.tensors {
        let dtype = DType::from_tag(&entry.dtype).ok_or_else(|| {
            PayloadError::decode("bad_dtype", format!("unknown tag: {}", entry.dtype))
        })?;
        let data = BASE64
            .decode(entry.data_b64.as_bytes())
            .map_err(|e| PayloadError::decode("bad_base64", e.to_string()))?;
        let tensor = Tensor::new(dtype, entry.shape, data)
            .map_err(|e| PayloadError::decode("bad_tensor", e.to_string()))?;
        payload.insert(entry.key, tensor);
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::digest::content_digest;

    fn sample_payload() -> Payload {
        let mut p = Payload::new();
        p.insert("W1", Tensor::from_f64(vec![2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap());
        p.insert("b1", Tensor::from_f64(vec![3], &[0.1, 0.2, 0.3]).unwrap());
        p.insert(
            "mask",
            Tensor::new(DType::U8, vec![4], vec![0, 1, 1, 0]).unwrap(),
        );
        p
    }

    #[test]
    fn test_binary_roundtrip() {
        let p = sample_payload();
        let bytes = ContainerFormat::Binary.encode(&p).unwrap();
        let decoded = ContainerFormat::Binary.decode(&bytes).unwrap();
        assert_eq!(p, decoded);
    }

    #[test]
    fn test_json_roundtrip() {
        let p = sample_payload();
        let bytes = ContainerFormat::Json.encode(&p).unwrap();
        let decoded = ContainerFormat::Json.decode(&bytes).unwrap();
        assert_eq!(p, decoded);
    }

    #[test]
    fn test_load_auto_detects_both_formats() {
        let p = sample_payload();
        for format in [ContainerFormat::Binary, ContainerFormat::Json] {
            let bytes = format.encode(&p).unwrap();
            let (decoded, detected) = load_auto(&bytes).unwrap();
            assert_eq!(detected, format);
            assert_eq!(decoded, p);
        }
    }

    #[test]
    fn test_digest_identical_across_formats() {
        let p = sample_payload();
        let order: Vec<String> = ["W1", "b1", "mask"].iter().map(|s| s.to_string()).collect();
        let expected = content_digest(&p, &order).unwrap();

        for format in [ContainerFormat::Binary, ContainerFormat::Json] {
            let bytes = format.encode(&p).unwrap();
            let (decoded, _) = load_auto(&bytes).unwrap();
            assert_eq!(content_digest(&decoded, &order).unwrap(), expected);
        }
    }

    #[test]
    fn test_truncated_binary_is_checked_error() {
        let p = sample_payload();
        let bytes = ContainerFormat::Binary.encode(&p).unwrap();
        let half = &bytes[..bytes.len() / 2];
        let err = load_auto(half).unwrap_err();
        assert_eq!(err.kind(), "truncated");
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let err = load_auto(b"definitely not a container").unwrap_err();
        assert_eq!(err.kind(), "bad_json");
    }

    #[test]
    fn test_huge_dim_is_checked_error_not_overflow() {
        // Hand-built entry declaring a dim of u64::MAX, as a bitflip in a
        // dim's high bits would produce.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"CKB1");
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.push(b'w');
        let tag = b"<f8";
        bytes.push(tag.len() as u8);
        bytes.extend_from_slice(tag);
        bytes.push(1); // ndim
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes()); // data_len

        let err = ContainerFormat::Binary.decode(&bytes).unwrap_err();
        assert_eq!(err.kind(), "bad_shape");
    }

    #[test]
    fn test_binary_trailing_bytes_rejected() {
        let p = sample_payload();
        let mut bytes = ContainerFormat::Binary.encode(&p).unwrap();
        bytes.push(0xAA);
        let err = ContainerFormat::Binary.decode(&bytes).unwrap_err();
        assert_eq!(err.kind(), "trailing_bytes");
    }

    #[test]
    fn test_extension_mapping() {
        assert_eq!(ContainerFormat::Binary.extension(), "tbin");
        assert_eq!(ContainerFormat::Json.extension(), "tjson");
        assert_eq!(ContainerFormat::from_extension("tbin"), Some(ContainerFormat::Binary));
        assert_eq!(ContainerFormat::from_extension("npz"), None);
    }
}
