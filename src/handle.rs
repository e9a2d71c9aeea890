//! Index handles - lifecycle of one index instance

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::batch;
use crate::codec::{codec_for, Codec, DataType, DistType};
use crate::engine::{create_method, SearchIndex};
use crate::error::{Error, Result};
use crate::params::Params;
use crate::point::{DataPoint, Layout, PointId, VectorBatch};
use crate::space::{create_space, Space};

/// A handle tagged by its distance-value type.
///
/// Only the float variant exists today; an integer-distance variant would
/// be an additional arm here rather than a rewrite, which is why the tag
/// lives in the type instead of a runtime branch.
#[derive(Debug)]
pub enum IndexHandle {
    Float(FloatIndex),
}

impl IndexHandle {
    /// Construct a handle for the given space, method, and type tags.
    ///
    /// `DistType::Int` is rejected outright: this crate is optimized for
    /// float vector spaces and never coerces integer distances.
    pub fn new(
        space_type: &str,
        space_params: &[String],
        method_name: &str,
        data_type: DataType,
        dist_type: DistType,
    ) -> Result<Self> {
        match dist_type {
            DistType::Float => Ok(IndexHandle::Float(FloatIndex::new(
                space_type,
                space_params,
                method_name,
                data_type,
            )?)),
            DistType::Int => Err(Error::UnsupportedType(
                "distance value type INT is not supported: this crate is \
                 optimized for FLOAT vector spaces"
                    .to_string(),
            )),
        }
    }

    /// The float-variant handle.
    pub fn as_float(&self) -> &FloatIndex {
        match self {
            IndexHandle::Float(index) => index,
        }
    }

    /// The float-variant handle, mutably.
    pub fn as_float_mut(&mut self) -> &mut FloatIndex {
        match self {
            IndexHandle::Float(index) => index,
        }
    }
}

/// An index over float vectors: a space, an append-only point collection,
/// and an optional built search structure.
#[derive(Debug)]
pub struct FloatIndex {
    space_type: String,
    method_name: String,
    data_type: DataType,
    space: Arc<dyn Space>,
    points: Vec<DataPoint>,
    index: Option<Box<dyn SearchIndex>>,
}

impl FloatIndex {
    fn new(
        space_type: &str,
        space_params: &[String],
        method_name: &str,
        data_type: DataType,
    ) -> Result<Self> {
        let params = Params::parse(space_params)?;
        let space = create_space(space_type, &params)?;
        Ok(Self {
            space_type: space_type.to_string(),
            method_name: method_name.to_string(),
            data_type,
            space,
            points: Vec::new(),
            index: None,
        })
    }

    fn codec(&self) -> Result<Codec> {
        codec_for(self.data_type)
    }

    /// Decode and append one point.
    ///
    /// An existing built structure stays valid; the new point becomes
    /// searchable only after the next [`Self::create_index`].
    pub fn add_data_point(&mut self, id: PointId, vector: &[f32]) -> Result<()> {
        let codec = self.codec()?;
        let point = (codec.reader)(vector, id)?;
        self.points.push(point);
        Ok(())
    }

    /// Decode and append a batch of points, one per row.
    ///
    /// The whole batch is decoded before anything is appended, so a failure
    /// leaves the collection untouched. Column-major input is rejected, not
    /// transposed.
    pub fn add_data_point_batch(&mut self, ids: &[PointId], batch: &VectorBatch) -> Result<()> {
        if batch.layout() != Layout::RowMajor {
            return Err(Error::DataFormat(
                "batch data must be in row-major order; transpose column-major \
                 input before inserting"
                    .to_string(),
            ));
        }
        if ids.len() != batch.rows() {
            return Err(Error::DataFormat(format!(
                "ids contains {} elements whereas the batch contains {} rows",
                ids.len(),
                batch.rows()
            )));
        }
        let codec = self.codec()?;
        let mut decoded = Vec::with_capacity(batch.rows());
        for (row, id) in ids.iter().enumerate() {
            decoded.push((codec.reader)(batch.row(row), *id)?);
        }
        self.points.extend(decoded);
        Ok(())
    }

    /// Build (or fully rebuild) the search structure over the current
    /// points.
    ///
    /// Any previous structure is released before the new one is created;
    /// there is no incremental path. On failure the handle keeps its points
    /// and stays inspectable, but is not searchable until a build succeeds.
    pub fn create_index(&mut self, build_params: &[String]) -> Result<()> {
        let params = Params::parse(build_params)?;
        // Release the stale structure before the rebuild sees the corpus.
        self.index = None;
        let snapshot: Arc<[DataPoint]> = self.points.iter().cloned().collect();
        info!(
            "Creating {} index over {} points (space={})",
            self.method_name,
            snapshot.len(),
            self.space_type
        );
        let mut method = create_method(&self.method_name, self.space.clone(), snapshot)?;
        method.build(&params)?;
        self.index = Some(method);
        Ok(())
    }

    /// Persist the built structure to `path`.
    pub fn save_index(&self, path: &Path) -> Result<()> {
        let index = self.index.as_ref().ok_or(Error::NotBuilt("save_index"))?;
        index.save(path)
    }

    /// Replace any built structure with one restored from `path`, bound to
    /// the current points.
    ///
    /// The caller must have repopulated the points exactly as they were at
    /// save time; the backends detect count and shape mismatches, beyond
    /// that search results against a different corpus are undefined.
    pub fn load_index(&mut self, path: &Path) -> Result<()> {
        self.index = None;
        // Missing files are I/O errors for every backend; corrupt content
        // stays the backend's call.
        std::fs::metadata(path)?;
        let snapshot: Arc<[DataPoint]> = self.points.iter().cloned().collect();
        let mut method = create_method(&self.method_name, self.space.clone(), snapshot)?;
        method.load(path)?;
        self.index = Some(method);
        Ok(())
    }

    /// Adjust search-time knobs on the built structure.
    pub fn set_query_time_params(&mut self, query_params: &[String]) -> Result<()> {
        let params = Params::parse(query_params)?;
        let index = self
            .index
            .as_mut()
            .ok_or(Error::NotBuilt("set_query_time_params"))?;
        index.set_query_time_params(&params)
    }

    /// Ids of the up-to-k nearest points to `vector`, ascending by
    /// distance.
    pub fn knn_query(&self, k: usize, vector: &[f32]) -> Result<Vec<PointId>> {
        if k == 0 {
            return Err(Error::Configuration("k must be >= 1, got 0".to_string()));
        }
        let index = self.index.as_ref().ok_or(Error::NotBuilt("knn_query"))?;
        let codec = self.codec()?;
        // Query points are temporaries; they never join the collection.
        let query = (codec.reader)(vector, 0)?;
        index.search(query.vector(), k)
    }

    /// Run one k-NN query per batch row across `num_workers` workers,
    /// returning results in row order.
    pub fn knn_query_batch(
        &self,
        num_workers: usize,
        k: usize,
        batch: &VectorBatch,
    ) -> Result<Vec<Vec<PointId>>> {
        if k == 0 {
            return Err(Error::Configuration("k must be >= 1, got 0".to_string()));
        }
        if batch.layout() != Layout::RowMajor {
            return Err(Error::DataFormat(
                "query batch must be in row-major order; transpose column-major \
                 input before querying"
                    .to_string(),
            ));
        }
        let index = self.index.as_ref().ok_or(Error::NotBuilt("knn_query_batch"))?;
        let codec = self.codec()?;
        let mut queries = Vec::with_capacity(batch.rows());
        for row in 0..batch.rows() {
            queries.push((codec.reader)(batch.row(row), 0)?);
        }
        batch::knn_query_batch(index.as_ref(), num_workers, k, queries)
    }

    /// The vector stored at a zero-based collection position (not a caller
    /// id).
    pub fn get_data_point(&self, position: usize) -> Result<Vec<f32>> {
        let point = self.points.get(position).ok_or(Error::IndexOutOfRange {
            index: position,
            qty: self.points.len(),
        })?;
        let codec = self.codec()?;
        Ok((codec.writer)(point))
    }

    /// Number of points currently held.
    pub fn get_data_point_qty(&self) -> usize {
        self.points.len()
    }

    /// Whether a built structure currently exists.
    pub fn is_built(&self) -> bool {
        self.index.is_some()
    }

    /// Space tag the handle was constructed with.
    pub fn space_type(&self) -> &str {
        &self.space_type
    }

    /// Method tag the handle was constructed with.
    pub fn method_name(&self) -> &str {
        &self.method_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector_handle(method: &str) -> FloatIndex {
        match IndexHandle::new("l2", &[], method, DataType::Vector, DistType::Float).unwrap() {
            IndexHandle::Float(index) => index,
        }
    }

    #[test]
    fn test_int_dist_type_rejected() {
        let err =
            IndexHandle::new("l2", &[], "brute_force", DataType::Vector, DistType::Int)
                .unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }

    #[test]
    fn test_string_data_type_rejected_at_use() {
        let mut handle = match IndexHandle::new(
            "l2",
            &[],
            "brute_force",
            DataType::String,
            DistType::Float,
        )
        .unwrap()
        {
            IndexHandle::Float(index) => index,
        };
        let err = handle.add_data_point(0, &[1.0]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }

    #[test]
    fn test_add_get_round_trip() {
        let mut handle = vector_handle("brute_force");
        handle.add_data_point(3, &[0.25, -1.5, 2.0]).unwrap();
        assert_eq!(handle.get_data_point(0).unwrap(), vec![0.25, -1.5, 2.0]);
        assert_eq!(handle.get_data_point_qty(), 1);
    }

    #[test]
    fn test_get_data_point_out_of_range() {
        let handle = vector_handle("brute_force");
        let err = handle.get_data_point(0).unwrap_err();
        assert!(err.to_string().contains("0..0"));
    }

    #[test]
    fn test_batch_add_checks_ids_and_layout() {
        let mut handle = vector_handle("brute_force");
        let data = [1.0, 0.0, 0.0, 1.0];

        let batch = VectorBatch::row_major(&data, 2, 2).unwrap();
        let err = handle.add_data_point_batch(&[0], &batch).unwrap_err();
        assert!(matches!(err, Error::DataFormat(_)));
        assert_eq!(handle.get_data_point_qty(), 0);

        let transposed = VectorBatch::column_major(&data, 2, 2).unwrap();
        let err = handle.add_data_point_batch(&[0, 1], &transposed).unwrap_err();
        assert!(err.to_string().contains("row-major"));
        assert_eq!(handle.get_data_point_qty(), 0);

        handle.add_data_point_batch(&[0, 1], &batch).unwrap();
        assert_eq!(handle.get_data_point_qty(), 2);
    }

    #[test]
    fn test_batch_add_is_atomic() {
        let mut handle = vector_handle("brute_force");
        let data = [1.0, 0.0, f32::NAN, 1.0];
        let batch = VectorBatch::row_major(&data, 2, 2).unwrap();
        assert!(handle.add_data_point_batch(&[0, 1], &batch).is_err());
        assert_eq!(handle.get_data_point_qty(), 0);
    }

    #[test]
    fn test_query_requires_build() {
        let mut handle = vector_handle("brute_force");
        handle.add_data_point(0, &[1.0]).unwrap();
        let err = handle.knn_query(1, &[1.0]).unwrap_err();
        assert!(matches!(err, Error::NotBuilt(_)));
        let err = handle.set_query_time_params(&[]).unwrap_err();
        assert!(matches!(err, Error::NotBuilt(_)));
        let err = handle.save_index(Path::new("/tmp/never")).unwrap_err();
        assert!(matches!(err, Error::NotBuilt(_)));
    }

    #[test]
    fn test_failed_build_keeps_points() {
        let mut handle = vector_handle("brute_force");
        let err = handle.create_index(&[]).unwrap_err();
        assert!(matches!(err, Error::Build(_)));
        handle.add_data_point(0, &[1.0, 0.0]).unwrap();
        assert_eq!(handle.get_data_point_qty(), 1);
        handle.create_index(&[]).unwrap();
        assert_eq!(handle.knn_query(1, &[1.0, 0.0]).unwrap(), vec![0]);
    }

    #[test]
    fn test_equidistant_scenario() {
        let mut handle = vector_handle("brute_force");
        let data = [1.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let batch = VectorBatch::row_major(&data, 3, 2).unwrap();
        handle.add_data_point_batch(&[0, 1, 2], &batch).unwrap();
        handle.create_index(&[]).unwrap();
        let ids = handle.knn_query(1, &[0.0, 0.0]).unwrap();
        assert_eq!(ids.len(), 1);
        // 0 and 1 tie at distance 1; 2 sits at sqrt(2) and must lose.
        assert!(ids[0] == 0 || ids[0] == 1);
    }

    #[test]
    fn test_rebuild_replaces_structure() {
        let mut handle = vector_handle("brute_force");
        handle.add_data_point(0, &[0.0, 0.0]).unwrap();
        handle.create_index(&[]).unwrap();
        assert_eq!(handle.knn_query(2, &[1.0, 1.0]).unwrap(), vec![0]);

        // Invisible until the rebuild.
        handle.add_data_point(1, &[1.0, 1.0]).unwrap();
        assert_eq!(handle.knn_query(2, &[1.0, 1.0]).unwrap(), vec![0]);

        handle.create_index(&[]).unwrap();
        assert_eq!(handle.knn_query(2, &[1.0, 1.0]).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_zero_k_rejected() {
        let mut handle = vector_handle("brute_force");
        handle.add_data_point(0, &[1.0]).unwrap();
        handle.create_index(&[]).unwrap();
        let err = handle.knn_query(0, &[1.0]).unwrap_err();
        assert!(err.to_string().contains(">= 1"));
    }
}
