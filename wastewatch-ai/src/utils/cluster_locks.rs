//! Grid-cell locks for hotspot clustering
//!
//! Two reports analyzed concurrently a few hundred metres apart must not both
//! conclude "no hotspot here" and create twins. Clustering for a point holds
//! the lock of its grid cell and the eight cells around it. With a cell size of
//! 0.01° (~1.1 km) any two points within the clustering radius share at least
//! one cell, so their clustering steps serialize. Cells are always acquired in
//! sorted order, which rules out lock-order deadlocks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use wastewatch_common::geo::GridCell;
use wastewatch_common::GeoPoint;

/// Default cell edge in degrees
pub const DEFAULT_CELL_DEGREES: f64 = 0.01;

/// Idle cell entries are dropped once the table grows past this
const PRUNE_THRESHOLD: usize = 4096;

pub struct ClusterLocks {
    cell_degrees: f64,
    cells: Mutex<HashMap<GridCell, Arc<AsyncMutex<()>>>>,
}

/// Holds a 3x3 neighborhood of cells until dropped
pub struct NeighborhoodGuard {
    cells: Vec<GridCell>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl NeighborhoodGuard {
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }
}

impl ClusterLocks {
    pub fn new(cell_degrees: f64) -> Self {
        Self {
            cell_degrees,
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Lock every cell in the neighborhood of `point`
    pub async fn lock_around(&self, point: &GeoPoint) -> NeighborhoodGuard {
        let cells = GridCell::containing(point, self.cell_degrees).neighborhood();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut table = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
            if table.len() > PRUNE_THRESHOLD {
                table.retain(|_, cell| Arc::strong_count(cell) > 1);
            }
            cells
                .iter()
                .map(|cell| table.entry(*cell).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }

        NeighborhoodGuard {
            cells,
            _guards: guards,
        }
    }

    /// Number of cells currently tracked
    pub fn tracked_cells(&self) -> usize {
        self.cells.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for ClusterLocks {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_DEGREES)
    }
}
