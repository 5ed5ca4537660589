//! Photo retrieval, decryption and de-duplication.

mod metadata;
mod payload;
mod pipeline;

pub use metadata::capture_time;
pub use payload::{decode_photo_payload, extension_for, sniff_mime};
pub use pipeline::{BlobRef, DecryptedPhoto, PhotoBatch, PhotoPipeline};
