//! Exact brute-force scan backend

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::params::Params;
use crate::point::{DataPoint, PointId};
use crate::space::Space;

use super::{check_query_dim, snapshot_dim, SearchIndex};

/// Sidecar written by `save`; the scan itself has no structure to persist,
/// so the file records what the snapshot must look like at load time.
#[derive(Debug, Serialize, Deserialize)]
struct BruteForceMeta {
    method: String,
    space: String,
    point_qty: usize,
    dimensions: usize,
}

/// Exact k-NN by scanning every point in the snapshot.
pub struct BruteForce {
    space: Arc<dyn Space>,
    points: Arc<[DataPoint]>,
    dim: usize,
}

impl BruteForce {
    pub fn new(space: Arc<dyn Space>, points: Arc<[DataPoint]>) -> Self {
        Self {
            space,
            points,
            dim: 0,
        }
    }

    fn meta(&self) -> BruteForceMeta {
        BruteForceMeta {
            method: "brute_force".to_string(),
            space: self.space.name().to_string(),
            point_qty: self.points.len(),
            dimensions: self.dim,
        }
    }
}

impl SearchIndex for BruteForce {
    fn build(&mut self, params: &Params) -> Result<()> {
        params.expect_known("brute_force build", &[])?;
        self.dim = snapshot_dim(&self.points)?;
        info!(
            "Built brute_force index: {} points, {} dims, space={}",
            self.points.len(),
            self.dim,
            self.space.name()
        );
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.meta())
            .map_err(|e| Error::Format(format!("failed to encode index metadata: {e}")))?;
        std::fs::write(path, content)?;
        info!("Saved brute_force index metadata to {:?}", path);
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        let meta: BruteForceMeta = serde_json::from_str(&content)
            .map_err(|e| Error::Format(format!("corrupt index file {path:?}: {e}")))?;
        if meta.method != "brute_force" {
            return Err(Error::Format(format!(
                "index file {path:?} was saved by method {:?}, not brute_force",
                meta.method
            )));
        }
        if meta.space != self.space.name() {
            return Err(Error::Format(format!(
                "index file {path:?} was saved under space {:?} but the handle uses {:?}",
                meta.space,
                self.space.name()
            )));
        }
        if meta.point_qty != self.points.len() {
            return Err(Error::Format(format!(
                "index file {path:?} covers {} points but the handle holds {}: \
                 repopulate the handle exactly as it was at save time",
                meta.point_qty,
                self.points.len()
            )));
        }
        let dim = snapshot_dim(&self.points).map_err(|e| Error::Format(e.to_string()))?;
        if meta.dimensions != dim {
            return Err(Error::Format(format!(
                "index file {path:?} covers {}-element points but the handle holds \
                 {dim}-element points",
                meta.dimensions
            )));
        }
        self.dim = dim;
        info!("Loaded brute_force index metadata from {:?}", path);
        Ok(())
    }

    fn set_query_time_params(&mut self, params: &Params) -> Result<()> {
        // The scan has no search-time knobs.
        params.expect_known("brute_force query-time", &[])
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<PointId>> {
        check_query_dim(query, self.dim)?;
        let mut scored: Vec<(f32, PointId)> = self
            .points
            .iter()
            .map(|p| (self.space.distance(query, p.vector()), p.id()))
            .collect();
        // Reader rejects non-finite elements, so distances are comparable.
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        Ok(scored.into_iter().map(|(_, id)| id).collect())
    }
}
