//! HNSW backend using usearch crate

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::{Error, Result};
use crate::params::Params;
use crate::point::{DataPoint, PointId};
use crate::space::Space;

use super::{check_query_dim, snapshot_dim, SearchIndex};

const DEFAULT_CONNECTIVITY: usize = 32;
const DEFAULT_EXPANSION: usize = 64;

/// Approximate k-NN over a usearch HNSW graph.
///
/// Graph keys are corpus positions; caller-assigned ids are recovered
/// through the bound snapshot at search time.
pub struct Hnsw {
    space: Arc<dyn Space>,
    points: Arc<[DataPoint]>,
    index: Option<Index>,
    dim: usize,
    connectivity: usize,
    expansion_add: usize,
}

impl Hnsw {
    pub fn new(space: Arc<dyn Space>, points: Arc<[DataPoint]>) -> Self {
        Self {
            space,
            points,
            index: None,
            dim: 0,
            connectivity: DEFAULT_CONNECTIVITY,
            expansion_add: DEFAULT_EXPANSION,
        }
    }

    fn metric(&self) -> Result<MetricKind> {
        match self.space.name() {
            "l2" => Ok(MetricKind::L2sq),
            "cosinesimil" => Ok(MetricKind::Cos),
            "negdotprod" => Ok(MetricKind::IP),
            other => Err(Error::Configuration(format!(
                "space {other:?} is not supported by the hnsw method: \
                 supported spaces are l2, cosinesimil, negdotprod"
            ))),
        }
    }

    fn new_index(&self) -> Result<Index> {
        let options = IndexOptions {
            dimensions: self.dim,
            metric: self.metric()?,
            quantization: ScalarKind::F32,
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: DEFAULT_EXPANSION,
            multi: false,
        };
        Index::new(&options).map_err(|e| Error::Build(format!("failed to create hnsw index: {e}")))
    }
}

impl SearchIndex for Hnsw {
    fn build(&mut self, params: &Params) -> Result<()> {
        params.expect_known("hnsw build", &["M", "efConstruction"])?;
        self.connectivity = params
            .get_parsed::<usize>("M")?
            .unwrap_or(DEFAULT_CONNECTIVITY);
        self.expansion_add = params
            .get_parsed::<usize>("efConstruction")?
            .unwrap_or(DEFAULT_EXPANSION);
        self.dim = snapshot_dim(&self.points)?;

        info!(
            "Building hnsw index: {} points, {} dims, M={}, efConstruction={}",
            self.points.len(),
            self.dim,
            self.connectivity,
            self.expansion_add
        );

        let index = self.new_index()?;
        index
            .reserve(self.points.len())
            .map_err(|e| Error::Build(format!("failed to reserve hnsw capacity: {e}")))?;
        for (position, point) in self.points.iter().enumerate() {
            index
                .add(position as u64, point.vector())
                .map_err(|e| Error::Build(format!("failed to add point id {}: {e}", point.id())))?;
        }

        self.index = Some(index);
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        let index = self
            .index
            .as_ref()
            .ok_or(Error::NotBuilt("save_index"))?;
        index
            .save(path.to_string_lossy().as_ref())
            .map_err(|e| Error::Format(format!("failed to save hnsw index to {path:?}: {e}")))?;
        info!("Saved hnsw index to {:?}", path);
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        self.dim = snapshot_dim(&self.points).map_err(|e| Error::Format(e.to_string()))?;
        let index = self.new_index()?;
        index
            .load(path.to_string_lossy().as_ref())
            .map_err(|e| Error::Format(format!("failed to load hnsw index from {path:?}: {e}")))?;
        if index.size() != self.points.len() {
            return Err(Error::Format(format!(
                "index file {path:?} holds {} vectors but the handle holds {} points: \
                 repopulate the handle exactly as it was at save time",
                index.size(),
                self.points.len()
            )));
        }
        info!("Loaded hnsw index with {} vectors from {:?}", index.size(), path);
        self.index = Some(index);
        Ok(())
    }

    fn set_query_time_params(&mut self, params: &Params) -> Result<()> {
        params.expect_known("hnsw query-time", &["efSearch"])?;
        if let Some(ef) = params.get_parsed::<usize>("efSearch")? {
            let index = self
                .index
                .as_ref()
                .ok_or(Error::NotBuilt("set_query_time_params"))?;
            index.change_expansion_search(ef);
            debug!("hnsw efSearch set to {}", ef);
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<PointId>> {
        let index = self.index.as_ref().ok_or(Error::NotBuilt("knn_query"))?;
        check_query_dim(query, self.dim)?;
        let matches = index
            .search(query, k)
            .map_err(|e| Error::Build(format!("hnsw search failed: {e}")))?;
        matches
            .keys
            .iter()
            .map(|key| {
                self.points
                    .get(*key as usize)
                    .map(DataPoint::id)
                    .ok_or_else(|| {
                        Error::Format(format!(
                            "hnsw index returned key {key} outside the bound snapshot \
                             of {} points",
                            self.points.len()
                        ))
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::create_space;

    fn grid_points() -> Arc<[DataPoint]> {
        // 3 well-separated clusters on a line.
        [
            DataPoint::new(100, &[0.0, 0.0]),
            DataPoint::new(200, &[10.0, 0.0]),
            DataPoint::new(300, &[20.0, 0.0]),
        ]
        .into_iter()
        .collect()
    }

    fn built() -> Hnsw {
        let space = create_space("l2", &Params::empty()).unwrap();
        let mut index = Hnsw::new(space, grid_points());
        index.build(&Params::empty()).unwrap();
        index
    }

    #[test]
    fn test_build_and_search_maps_caller_ids() {
        let index = built();
        let ids = index.search(&[10.5, 0.0], 1).unwrap();
        assert_eq!(ids, vec![200]);
        let ids = index.search(&[-1.0, 0.0], 3).unwrap();
        assert_eq!(ids, vec![100, 200, 300]);
    }

    #[test]
    fn test_unsupported_space_for_hnsw() {
        let space = create_space("l1", &Params::empty()).unwrap();
        let mut index = Hnsw::new(space, grid_points());
        let err = index.build(&Params::empty()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_build_params_and_ef_search() {
        let space = create_space("l2", &Params::empty()).unwrap();
        let mut index = Hnsw::new(space, grid_points());
        let params = Params::parse(&["M=16", "efConstruction=128"]).unwrap();
        index.build(&params).unwrap();

        let ef = Params::parse(&["efSearch=100"]).unwrap();
        index.set_query_time_params(&ef).unwrap();

        let unknown = Params::parse(&["alpha=1"]).unwrap();
        assert!(index.set_query_time_params(&unknown).is_err());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hnsw.index");

        let index = built();
        index.save(&path).unwrap();

        let space = create_space("l2", &Params::empty()).unwrap();
        let mut reloaded = Hnsw::new(space, grid_points());
        reloaded.load(&path).unwrap();
        assert_eq!(reloaded.search(&[19.0, 0.0], 1).unwrap(), vec![300]);
    }

    #[test]
    fn test_load_against_wrong_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hnsw.index");
        built().save(&path).unwrap();

        let space = create_space("l2", &Params::empty()).unwrap();
        let one_point: Arc<[DataPoint]> =
            [DataPoint::new(0, &[0.0, 0.0])].into_iter().collect();
        let mut wrong = Hnsw::new(space, one_point);
        let err = wrong.load(&path).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }
}
