//! The `scenedoc` crate decodes binary scene documents: binary `FBX` files into a
//! typed node tree, and Panda3D `BAM` files into a stream of objects.
//!
//! Decoding works on an in-memory buffer; where the bytes come from is up to the
//! caller. Warnings are returned with the result and mirrored to `tracing`.
//!
//! ```no_run
//! let bytes = std::fs::read("cube.fbx").unwrap();
//! let document = scenedoc::decode_fbx(&bytes).unwrap();
//! for (name, node) in &document.nodes {
//!     println!("{}: {} properties", name, node.properties.len());
//! }
//! ```

pub mod bam;
pub mod cursor;
pub mod error;
pub mod fbx;
pub mod inflate;
pub mod options;
pub mod types;

pub use bam::{BamHeader, BamObject, BamObjectCode, BamReader, BamType};
pub use cursor::{ByteCursor, Endian, Primitive};
pub use error::{Diagnostic, Error, Result};
pub use fbx::Document;
pub use inflate::{Inflate, Zlib};
pub use options::{DecodeOptions, Strictness};
pub use types::{
    ConnectionLink, ConnectionRelationships, Field, Node, Property, PropertyRecord, RecordValue,
};

/// Decode a binary FBX buffer with the default options and zlib inflate.
pub fn decode_fbx(bytes: &[u8]) -> Result<Document> {
    fbx::decode(bytes, &DecodeOptions::default(), &Zlib)
}

/// Decode a binary FBX buffer with explicit options and decompression primitive.
pub fn decode_fbx_with(bytes: &[u8], options: &DecodeOptions, inflate: &dyn Inflate) -> Result<Document> {
    fbx::decode(bytes, options, inflate)
}

#[cfg(test)]
mod tests;
