//! Spatial hash grid for bounded-cost neighbor queries.
//!
//! The plane is partitioned into uniform cells sized to the sensing range
//! so each agent only inspects nearby cells instead of the whole
//! population. Three distinct arrays cross the host/device boundary:
//!
//! - `lookup`: bin assignments from the previous frame, read-only to the
//!   kernel,
//! - `update`: bin assignments the kernel writes for the current frame,
//! - `size`: per-cell occupancy counters the kernel increments.
//!
//! Keeping the read and write sides distinct avoids read/write races on
//! one array within a dispatch. After read-back the device's `update`
//! contents are adopted as next frame's `lookup` input; the host-side
//! `update` and `size` arrays stay in their cleared state and are
//! re-uploaded each frame, which resets the device-side scratch before
//! every dispatch. Lookup is never recomputed from agent positions.

use bytemuck::cast_slice;
use glam::Vec2;

use crate::error::PipelineError;

/// Cell edge length in world units, sized to the default sensing range.
pub const CELL_EDGE: f32 = 60.0;
/// Hard per-cell capacity. Agents beyond this are silently dropped from
/// the cell for the frame (acceptable at bounded density; a documented
/// limitation, not surfaced to the caller).
pub const CELL_CAPACITY: usize = 64;
/// Sentinel marking an empty slot in the lookup/update arrays.
pub const EMPTY_SLOT: i32 = -1;

/// Grid extent derived from the viewport at setup. Fixed for the run;
/// a viewport change means building a new grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridDimensions {
    pub rows: u32,
    pub columns: u32,
}

impl GridDimensions {
    /// Compute rows and columns from the viewport size and the fixed cell
    /// edge length.
    pub fn for_screen(screen_size: Vec2) -> Self {
        Self {
            rows: (screen_size.y / CELL_EDGE).ceil() as u32,
            columns: (screen_size.x / CELL_EDGE).ceil() as u32,
        }
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> u32 {
        self.rows * self.columns
    }

    /// Cell id for a position: `floor(y/edge)*columns + floor(x/edge)`,
    /// clamped so positions on the far screen edge still map in range.
    pub fn cell_index(&self, pos: Vec2) -> u32 {
        let column = ((pos.x / CELL_EDGE) as u32).min(self.columns - 1);
        let row = ((pos.y / CELL_EDGE) as u32).min(self.rows - 1);
        row * self.columns + column
    }
}

/// Host-side mirror of the hash buffers.
pub struct SpatialHashGrid {
    dims: GridDimensions,
    lookup: Vec<i32>,
    update: Vec<i32>,
    size: Vec<i32>,
}

impl SpatialHashGrid {
    /// Allocate the grid for a viewport. All arrays start cleared.
    pub fn new(screen_size: Vec2) -> Self {
        let dims = GridDimensions::for_screen(screen_size);
        let slots = dims.cell_count() as usize * CELL_CAPACITY;
        Self {
            dims,
            lookup: vec![EMPTY_SLOT; slots],
            update: vec![EMPTY_SLOT; slots],
            size: vec![0; dims.cell_count() as usize],
        }
    }

    pub fn dimensions(&self) -> GridDimensions {
        self.dims
    }

    /// Clear all three arrays back to their empty markers.
    pub fn reset(&mut self) {
        self.lookup.fill(EMPTY_SLOT);
        self.update.fill(EMPTY_SLOT);
        self.size.fill(0);
    }

    /// Prior-frame bin assignments, read by the kernel.
    pub fn lookup_bytes(&self) -> &[u8] {
        cast_slice(&self.lookup)
    }

    /// Cleared scratch the kernel writes this frame's bins into.
    pub fn update_bytes(&self) -> &[u8] {
        cast_slice(&self.update)
    }

    /// Cleared per-cell occupancy counters.
    pub fn size_bytes(&self) -> &[u8] {
        cast_slice(&self.size)
    }

    /// Adopt the device's update buffer as next frame's lookup input.
    ///
    /// Called once per frame after read-back; the returned contents are
    /// the authoritative bin assignment for the step just completed. A
    /// byte-length mismatch is fatal.
    pub fn adopt_update(&mut self, bytes: &[u8]) -> Result<(), PipelineError> {
        let expected = self.lookup.len() * 4;
        if bytes.len() != expected {
            return Err(PipelineError::SizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        // Read-back slices carry no alignment guarantee, so decode the
        // little-endian words instead of reinterpreting the slice.
        for (slot, chunk) in self.lookup.iter_mut().zip(bytes.chunks_exact(4)) {
            *slot = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(())
    }

    /// Agent indices stored in one cell of the current lookup array.
    pub fn cell_occupants(&self, cell: u32) -> impl Iterator<Item = u32> + '_ {
        let start = cell as usize * CELL_CAPACITY;
        self.lookup[start..start + CELL_CAPACITY]
            .iter()
            .copied()
            .filter(|&slot| slot != EMPTY_SLOT)
            .map(|slot| slot as u32)
    }
}
