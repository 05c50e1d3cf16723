//! Payload model, container codecs, and content digests.
//!
//! The digest and the scanner depend only on the [`PayloadView`] capability,
//! never on a concrete container format.

pub mod container;
pub mod digest;
pub mod errors;
pub mod types;

pub use container::{load_auto, ContainerFormat};
pub use digest::{content_digest, tensor_digest};
pub use errors::{PayloadError, PayloadResult};
pub use types::{render_shape, DType, Payload, PayloadView, Tensor};
