//! Tensor payload model.
//!
//! A payload is a mapping of key -> (dtype, shape, raw element bytes),
//! produced once per epoch and immutable thereafter. Element bytes are
//! always stored contiguous in row-major order; there is no strided view
//! type, so a digest can never silently hash non-contiguous data.

use std::collections::BTreeMap;
use std::fmt;

use super::errors::{PayloadError, PayloadResult};

/// Element type tag.
///
/// Rendered in the NumPy array-interface style (`<f8`, `|u1`) so digests
/// are stable across container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
    U8,
}

impl DType {
    /// Canonical tag string hashed into digests and stored in containers.
    pub fn tag(&self) -> &'static str {
        match self {
            DType::F32 => "<f4",
            DType::F64 => "<f8",
            DType::I32 => "<i4",
            DType::I64 => "<i8",
            DType::U8 => "|u1",
        }
    }

    /// Bytes per element.
    pub fn size(&self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
            DType::U8 => 1,
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "<f4" => Some(DType::F32),
            "<f8" => Some(DType::F64),
            "<i4" => Some(DType::I32),
            "<i8" => Some(DType::I64),
            "|u1" => Some(DType::U8),
            _ => None,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Renders a shape canonically as a parenthesized tuple.
///
/// `[128, 128]` -> `(128, 128)`, `[128]` -> `(128,)`, `[]` -> `()`.
/// This exact rendering is part of the digest contract.
pub fn render_shape(shape: &[usize]) -> String {
    match shape.len() {
        0 => "()".to_string(),
        1 => format!("({},)", shape[0]),
        _ => {
            let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
            format!("({})", dims.join(", "))
        }
    }
}

/// One named array: dtype, shape, and contiguous row-major element bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    dtype: DType,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl Tensor {
    /// Builds a tensor, validating that the byte length matches the shape.
    /// Shape dims can come straight from untrusted container bytes, so the
    /// element count is computed with overflow checks.
    pub fn new(dtype: DType, shape: Vec<usize>, data: Vec<u8>) -> PayloadResult<Self> {
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(*d))
            .and_then(|elems| elems.checked_mul(dtype.size()))
            .ok_or_else(|| {
                PayloadError::Tensor(format!(
                    "shape {} overflows addressable size",
                    render_shape(&shape)
                ))
            })?;
        if data.len() != expected {
            return Err(PayloadError::Tensor(format!(
                "byte length {} does not match dtype {} shape {} (expected {})",
                data.len(),
                dtype.tag(),
                render_shape(&shape),
                expected
            )));
        }
        Ok(Self { dtype, shape, data })
    }

    /// Builds an f64 tensor from element values.
    pub fn from_f64(shape: Vec<usize>, values: &[f64]) -> PayloadResult<Self> {
        let mut data = Vec::with_capacity(values.len() * 8);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        Self::new(DType::F64, shape, data)
    }

    /// Builds an f64 tensor by invoking `f` once per element in row-major
    /// order. Infallible: the length invariant holds by construction.
    pub fn filled_f64(shape: Vec<usize>, mut f: impl FnMut() -> f64) -> Self {
        let elems: usize = shape.iter().product();
        let mut data = Vec::with_capacity(elems * 8);
        for _ in 0..elems {
            data.extend_from_slice(&f().to_le_bytes());
        }
        Self {
            dtype: DType::F64,
            shape,
            data,
        }
    }

    /// Decodes the element bytes as f64 values. Empty for other dtypes.
    pub fn f64_values(&self) -> Vec<f64> {
        if self.dtype != DType::F64 {
            return Vec::new();
        }
        self.data
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect()
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Counts NaN and infinite elements. Integer dtypes report (0, 0).
    ///
    /// NaN/Inf are an integrity signal for the scanner only; digests hash
    /// their raw bit patterns without special-casing.
    pub fn count_nan_inf(&self) -> (u64, u64) {
        let mut nan = 0u64;
        let mut inf = 0u64;
        match self.dtype {
            DType::F64 => {
                for chunk in self.data.chunks_exact(8) {
                    let v = f64::from_le_bytes([
                        chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6],
                        chunk[7],
                    ]);
                    if v.is_nan() {
                        nan += 1;
                    } else if v.is_infinite() {
                        inf += 1;
                    }
                }
            }
            DType::F32 => {
                for chunk in self.data.chunks_exact(4) {
                    let v = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                    if v.is_nan() {
                        nan += 1;
                    } else if v.is_infinite() {
                        inf += 1;
                    }
                }
            }
            _ => {}
        }
        (nan, inf)
    }
}

/// Capability every container-backed payload exposes: enumerate keys and
/// fetch tensors. Digest and scanner depend only on this, never on a
/// concrete container format.
pub trait PayloadView {
    /// Keys in the container's stored order.
    fn keys(&self) -> Vec<&str>;

    fn tensor(&self, key: &str) -> Option<&Tensor>;
}

/// In-memory payload: key -> tensor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    tensors: BTreeMap<String, Tensor>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, tensor: Tensor) {
        self.tensors.insert(key.into(), tensor);
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Tensor> {
        self.tensors.get_mut(key)
    }
}

impl PayloadView for Payload {
    fn keys(&self) -> Vec<&str> {
        self.tensors.keys().map(|k| k.as_str()).collect()
    }

    fn tensor(&self, key: &str) -> Option<&Tensor> {
        self.tensors.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_shape_matches_tuple_convention() {
        assert_eq!(render_shape(&[128, 128]), "(128, 128)");
        assert_eq!(render_shape(&[128]), "(128,)");
        assert_eq!(render_shape(&[128, 10]), "(128, 10)");
        assert_eq!(render_shape(&[]), "()");
        assert_eq!(render_shape(&[2, 3, 4]), "(2, 3, 4)");
    }

    #[test]
    fn test_dtype_tag_roundtrip() {
        for dtype in [DType::F32, DType::F64, DType::I32, DType::I64, DType::U8] {
            assert_eq!(DType::from_tag(dtype.tag()), Some(dtype));
        }
        assert_eq!(DType::from_tag("<c16"), None);
    }

    #[test]
    fn test_tensor_length_validation() {
        assert!(Tensor::new(DType::F64, vec![2, 2], vec![0u8; 32]).is_ok());
        assert!(Tensor::new(DType::F64, vec![2, 2], vec![0u8; 31]).is_err());
        assert!(Tensor::new(DType::U8, vec![3], vec![1, 2, 3]).is_ok());
    }

    #[test]
    fn test_tensor_overflowing_shape_is_checked_error() {
        // A dim this large can only come from corrupted container bytes.
        assert!(Tensor::new(DType::F64, vec![usize::MAX], vec![]).is_err());
        assert!(Tensor::new(DType::U8, vec![usize::MAX, 2], vec![]).is_err());
    }

    #[test]
    fn test_from_f64() {
        let t = Tensor::from_f64(vec![2], &[1.5, -2.5]).unwrap();
        assert_eq!(t.dtype(), DType::F64);
        assert_eq!(t.data().len(), 16);
        assert_eq!(t.num_elements(), 2);
    }

    #[test]
    fn test_count_nan_inf() {
        let t = Tensor::from_f64(vec![4], &[1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY])
            .unwrap();
        assert_eq!(t.count_nan_inf(), (1, 2));

        let ints = Tensor::new(DType::I64, vec![1], vec![0xFFu8; 8]).unwrap();
        assert_eq!(ints.count_nan_inf(), (0, 0));
    }

    #[test]
    fn test_payload_view_keys_sorted() {
        let mut p = Payload::new();
        p.insert("b1", Tensor::from_f64(vec![1], &[0.0]).unwrap());
        p.insert("W1", Tensor::from_f64(vec![1], &[0.0]).unwrap());
        // BTreeMap ordering: ASCII uppercase before lowercase
        assert_eq!(p.keys(), vec!["W1", "b1"]);
        assert!(p.tensor("W1").is_some());
        assert!(p.tensor("missing").is_none());
    }
}
