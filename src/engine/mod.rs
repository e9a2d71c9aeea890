//! Engine module - search-index backends behind a narrow trait

mod brute;
mod hnsw;

use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::params::Params;
use crate::point::{DataPoint, PointId};
use crate::space::Space;

/// A concrete search structure bound to one snapshot of the point
/// collection.
///
/// The structure is read-only during `search`, which makes concurrent
/// searches from the batch query workers safe; all mutating operations take
/// `&mut self` and are serialized by the owning handle.
pub trait SearchIndex: Send + Sync {
    /// Construct the structure over the bound snapshot.
    fn build(&mut self, params: &Params) -> Result<()>;

    /// Persist the built structure. The byte layout is owned by the
    /// backend and opaque to callers.
    fn save(&self, path: &Path) -> Result<()>;

    /// Restore a previously saved structure against the bound snapshot.
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Adjust search-time behavior only; never the corpus or structure.
    fn set_query_time_params(&mut self, params: &Params) -> Result<()>;

    /// Ids of the up-to-k nearest points, ascending by distance.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<PointId>>;
}

impl std::fmt::Debug for dyn SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SearchIndex")
    }
}

/// Create a backend for `method_name`, bound to `points`.
///
/// The snapshot is taken by the caller; points appended to the handle after
/// this call are invisible to the returned structure.
pub fn create_method(
    method_name: &str,
    space: Arc<dyn Space>,
    points: Arc<[DataPoint]>,
) -> Result<Box<dyn SearchIndex>> {
    match method_name {
        "brute_force" => Ok(Box::new(brute::BruteForce::new(space, points))),
        "hnsw" => Ok(Box::new(hnsw::Hnsw::new(space, points))),
        other => Err(Error::Configuration(format!(
            "unknown method {other:?}: supported methods are brute_force, hnsw"
        ))),
    }
}

/// Uniform dimensionality of a snapshot, for backends that require one.
///
/// An empty corpus and mixed dimensionalities are both build failures; the
/// error names the first offending point.
pub(crate) fn snapshot_dim(points: &[DataPoint]) -> Result<usize> {
    let first = points.first().ok_or_else(|| {
        Error::Build("cannot build an index over an empty point collection".to_string())
    })?;
    let dim = first.dim();
    for (position, point) in points.iter().enumerate().skip(1) {
        if point.dim() != dim {
            return Err(Error::Build(format!(
                "point at position {position} (id {}) has {} elements but the \
                 collection starts with {dim}-element points",
                point.id(),
                point.dim()
            )));
        }
    }
    Ok(dim)
}

/// Dimensionality gate shared by the backends' search paths.
pub(crate) fn check_query_dim(query: &[f32], dim: usize) -> Result<()> {
    if query.len() != dim {
        return Err(Error::DataFormat(format!(
            "query has {} elements but the index holds {dim}-element points",
            query.len()
        )));
    }
    Ok(())
}
