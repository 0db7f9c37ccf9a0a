//! Packet translation core: the codec types, field pipelines and per-version
//! registries that rewrite packets in flight between two adjacent protocol
//! versions. The connection layer feeding packets in and flushing them out
//! lives elsewhere; everything here is synchronous work over in-memory
//! buffers.

pub mod buffer;
pub mod chunk;
pub mod component;
pub mod pipeline;
pub mod registry;
pub mod rewrite;
pub mod types;

pub use buffer::PacketBuffer;
pub use pipeline::{FieldKind, FieldValue, Pipeline, Step, Translation};
pub use registry::{Connection, EntityTaxonomy, EntityTracker, TranslationRegistry};
