//! Data points and borrowed vector batches

use std::sync::Arc;

use crate::error::{Error, Result};

/// Caller-assigned point identifier.
pub type PointId = i32;

/// Size in bytes of one vector element.
pub const ELEMENT_WIDTH: usize = std::mem::size_of::<f32>();

/// One indexed item: a caller-assigned id plus an immutable fixed-width
/// vector payload.
///
/// The payload is shared, so cloning a point (e.g. when snapshotting the
/// corpus for a build) never copies vector data. Once constructed the
/// payload is never mutated.
#[derive(Debug, Clone)]
pub struct DataPoint {
    id: PointId,
    data: Arc<[f32]>,
}

impl DataPoint {
    pub fn new(id: PointId, values: &[f32]) -> Self {
        Self {
            id,
            data: values.into(),
        }
    }

    pub fn id(&self) -> PointId {
        self.id
    }

    /// The vector payload.
    pub fn vector(&self) -> &[f32] {
        &self.data
    }

    /// Number of elements.
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    /// Payload size in bytes; always an exact multiple of [`ELEMENT_WIDTH`].
    pub fn byte_len(&self) -> usize {
        self.data.len() * ELEMENT_WIDTH
    }
}

/// Memory layout of a [`VectorBatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    RowMajor,
    ColumnMajor,
}

/// A borrowed N x D single-precision matrix.
///
/// Bulk insertion and batch query accept only `RowMajor` data; a
/// `ColumnMajor` batch is rejected at the point of use rather than
/// transposed. Construction only checks that the buffer length matches the
/// declared shape.
#[derive(Debug, Clone, Copy)]
pub struct VectorBatch<'a> {
    data: &'a [f32],
    rows: usize,
    cols: usize,
    layout: Layout,
}

impl<'a> VectorBatch<'a> {
    /// A row-major batch of `rows` vectors of `cols` elements each.
    pub fn row_major(data: &'a [f32], rows: usize, cols: usize) -> Result<Self> {
        Self::with_layout(data, rows, cols, Layout::RowMajor)
    }

    /// A column-major batch. Constructible so that callers holding
    /// transposed data get a precise rejection from the adapter instead of
    /// silently wrong distances.
    pub fn column_major(data: &'a [f32], rows: usize, cols: usize) -> Result<Self> {
        Self::with_layout(data, rows, cols, Layout::ColumnMajor)
    }

    fn with_layout(data: &'a [f32], rows: usize, cols: usize, layout: Layout) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::DataFormat(format!(
                "batch buffer holds {} elements but the declared shape {}x{} requires {}",
                data.len(),
                rows,
                cols,
                rows * cols
            )));
        }
        Ok(Self {
            data,
            rows,
            cols,
            layout,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Row `i` of a row-major batch.
    ///
    /// Only meaningful for `RowMajor` data; callers gate on [`Self::layout`]
    /// first.
    pub fn row(&self, i: usize) -> &'a [f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }
}
