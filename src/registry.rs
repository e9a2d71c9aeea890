//! Generational handle registry - the caller-facing operation surface

use std::path::Path;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::info;

use crate::codec::{DataType, DistType};
use crate::error::{Error, Result};
use crate::handle::IndexHandle;
use crate::point::{PointId, VectorBatch};

/// Opaque token identifying a live handle in a [`Registry`].
///
/// Packs a slot index and a generation counter; once the handle is freed
/// the slot's generation moves on and the token is permanently dead, so a
/// stale token can never reach another handle that happens to reuse the
/// slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexToken(u64);

impl IndexToken {
    fn new(slot: u32, generation: u32) -> Self {
        Self((u64::from(slot) << 32) | u64::from(generation))
    }

    fn slot(self) -> usize {
        (self.0 >> 32) as usize
    }

    fn generation(self) -> u32 {
        self.0 as u32
    }

    /// Raw token value, usable across an FFI-style boundary.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Reconstruct a token from its raw value.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

struct Slot {
    generation: u32,
    handle: Option<Arc<RwLock<IndexHandle>>>,
}

/// Token-to-handle table.
///
/// The registry lock is held only to resolve or retire tokens; operations
/// then run under the individual handle's own lock (read for queries,
/// write for mutations), so long builds or batch queries on one handle
/// never block work on another.
pub struct Registry {
    slots: RwLock<Vec<Slot>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    /// Construct a handle and issue a token for it.
    pub fn init(
        &self,
        space_type: &str,
        space_params: &[String],
        method_name: &str,
        data_type: DataType,
        dist_type: DistType,
    ) -> Result<IndexToken> {
        let handle = IndexHandle::new(space_type, space_params, method_name, data_type, dist_type)?;
        let handle = Arc::new(RwLock::new(handle));

        let token = {
            let mut slots = self.slots.write().unwrap();
            // Reuse the first retired slot; its generation already moved
            // past every token issued for it.
            let reused = slots
                .iter_mut()
                .enumerate()
                .find(|(_, slot)| slot.handle.is_none());
            match reused {
                Some((i, slot)) => {
                    slot.handle = Some(handle);
                    IndexToken::new(i as u32, slot.generation)
                }
                None => {
                    let slot = slots.len() as u32;
                    slots.push(Slot {
                        generation: 0,
                        handle: Some(handle),
                    });
                    IndexToken::new(slot, 0)
                }
            }
        };
        info!(
            "Initialized {} index handle in slot {} (space={})",
            method_name,
            token.slot(),
            space_type
        );
        Ok(token)
    }

    fn resolve(&self, token: IndexToken) -> Result<Arc<RwLock<IndexHandle>>> {
        let slots = self.slots.read().unwrap();
        slots
            .get(token.slot())
            .filter(|slot| slot.generation == token.generation())
            .and_then(|slot| slot.handle.clone())
            .ok_or(Error::InvalidHandle(token.raw()))
    }

    /// Retire a token and release its handle: the space, any built
    /// structure, and every owned point.
    ///
    /// The token is single-use; every later operation through it fails with
    /// [`Error::InvalidHandle`].
    pub fn free_index(&self, token: IndexToken) -> Result<()> {
        let handle = {
            let mut slots = self.slots.write().unwrap();
            let slot = slots
                .get_mut(token.slot())
                .filter(|slot| slot.generation == token.generation())
                .ok_or(Error::InvalidHandle(token.raw()))?;
            let handle = slot
                .handle
                .take()
                .ok_or(Error::InvalidHandle(token.raw()))?;
            slot.generation = slot.generation.wrapping_add(1);
            handle
        };
        // Drop outside the registry lock; releasing a large corpus is not
        // instant.
        drop(handle);
        info!("Freed index handle in slot {}", token.slot());
        Ok(())
    }

    pub fn add_data_point(&self, token: IndexToken, id: PointId, vector: &[f32]) -> Result<()> {
        let handle = self.resolve(token)?;
        let mut handle = handle.write().unwrap();
        handle.as_float_mut().add_data_point(id, vector)
    }

    pub fn add_data_point_batch(
        &self,
        token: IndexToken,
        ids: &[PointId],
        batch: &VectorBatch,
    ) -> Result<()> {
        let handle = self.resolve(token)?;
        let mut handle = handle.write().unwrap();
        handle.as_float_mut().add_data_point_batch(ids, batch)
    }

    pub fn create_index(&self, token: IndexToken, build_params: &[String]) -> Result<()> {
        let handle = self.resolve(token)?;
        let mut handle = handle.write().unwrap();
        handle.as_float_mut().create_index(build_params)
    }

    pub fn save_index(&self, token: IndexToken, path: &Path) -> Result<()> {
        let handle = self.resolve(token)?;
        let handle = handle.read().unwrap();
        handle.as_float().save_index(path)
    }

    pub fn load_index(&self, token: IndexToken, path: &Path) -> Result<()> {
        let handle = self.resolve(token)?;
        let mut handle = handle.write().unwrap();
        handle.as_float_mut().load_index(path)
    }

    pub fn set_query_time_params(&self, token: IndexToken, params: &[String]) -> Result<()> {
        let handle = self.resolve(token)?;
        let mut handle = handle.write().unwrap();
        handle.as_float_mut().set_query_time_params(params)
    }

    pub fn knn_query(&self, token: IndexToken, k: usize, vector: &[f32]) -> Result<Vec<PointId>> {
        let handle = self.resolve(token)?;
        let handle = handle.read().unwrap();
        handle.as_float().knn_query(k, vector)
    }

    pub fn knn_query_batch(
        &self,
        token: IndexToken,
        num_workers: usize,
        k: usize,
        batch: &VectorBatch,
    ) -> Result<Vec<Vec<PointId>>> {
        let handle = self.resolve(token)?;
        let handle = handle.read().unwrap();
        handle.as_float().knn_query_batch(num_workers, k, batch)
    }

    pub fn get_data_point(&self, token: IndexToken, position: usize) -> Result<Vec<f32>> {
        let handle = self.resolve(token)?;
        let handle = handle.read().unwrap();
        handle.as_float().get_data_point(position)
    }

    pub fn get_data_point_qty(&self, token: IndexToken) -> Result<usize> {
        let handle = self.resolve(token)?;
        let handle = handle.read().unwrap();
        Ok(handle.as_float().get_data_point_qty())
    }
}
