//! Vicinity - a handle-based adapter for k-NN vector search engines
//!
//! The crate owns no search algorithm itself. It owns the index-handle
//! lifecycle (create, populate, build, save/load, query, free), the
//! marshalling contract between flat `f32` vectors and the engine's opaque
//! points, and a concurrent batch-query dispatcher over a single read-only
//! index. Search structures live behind the narrow [`engine::SearchIndex`]
//! trait; `brute_force` (exact scan) and `hnsw` (usearch) backends are
//! built in.
//!
//! ```no_run
//! use vicinity::{DataType, DistType, Registry, VectorBatch};
//!
//! # fn main() -> vicinity::Result<()> {
//! let registry = Registry::global();
//! let token = registry.init("l2", &[], "brute_force", DataType::Vector, DistType::Float)?;
//!
//! let data = [1.0, 0.0, 0.0, 1.0, 1.0, 1.0];
//! let batch = VectorBatch::row_major(&data, 3, 2)?;
//! registry.add_data_point_batch(token, &[0, 1, 2], &batch)?;
//! registry.create_index(token, &[])?;
//!
//! let neighbors = registry.knn_query(token, 1, &[0.0, 0.0])?;
//! assert_eq!(neighbors.len(), 1);
//! registry.free_index(token)?;
//! # Ok(())
//! # }
//! ```

mod batch;
mod codec;
mod error;
mod handle;
mod params;
mod point;
mod registry;
mod space;

pub mod engine;

pub use codec::{codec_for, Codec, DataType, DistType, ReaderFn, WriterFn};
pub use error::{Error, Result};
pub use handle::{FloatIndex, IndexHandle};
pub use params::Params;
pub use point::{DataPoint, Layout, PointId, VectorBatch, ELEMENT_WIDTH};
pub use registry::{IndexToken, Registry};
pub use space::{create_space, Space};
