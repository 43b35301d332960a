//! CPU-side packed agent state.
//!
//! All agents live in one flat `f32` array with a fixed 16-float stride
//! per record. The stride and field offsets are a wire contract shared
//! with the compute kernel and with the render-instance collaborator,
//! which consumes the leading eight floats directly as a 2-D instance
//! transform. The four color floats are rendering passthrough the kernel
//! never touches.

use bytemuck::cast_slice;
use glam::Vec2;
use rand::Rng;

use crate::error::PipelineError;

/// Floats per agent record. Fixed once per run.
pub const FLOATS_PER_BOID: usize = 16;
/// Bytes per agent record.
pub const BYTES_PER_BOID: usize = FLOATS_PER_BOID * 4;

// Offsets into one record. The first two rows are the instance transform
// (basis columns interleaved with translation), then RGBA, then the
// per-agent simulation payload.
pub(crate) const OFF_BASIS_XX: usize = 0;
pub(crate) const OFF_BASIS_YX: usize = 1;
pub(crate) const OFF_POS_X: usize = 3;
pub(crate) const OFF_BASIS_XY: usize = 4;
pub(crate) const OFF_BASIS_YY: usize = 5;
pub(crate) const OFF_POS_Y: usize = 7;
pub(crate) const OFF_COLOR: usize = 8;
pub(crate) const OFF_VEL_X: usize = 12;
pub(crate) const OFF_VEL_Y: usize = 13;
pub(crate) const OFF_FLOCK: usize = 14;
pub(crate) const OFF_BIN: usize = 15;

/// Position and heading of one agent, as consumed by the renderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstanceTransform {
    pub position: Vec2,
    pub heading: Vec2,
}

/// Packed state for every agent in the simulation.
///
/// Allocated once at setup; the agent count never changes afterwards.
/// Growing or shrinking the population means building a new store.
pub struct BoidStateStore {
    count: u32,
    data: Vec<f32>,
}

impl BoidStateStore {
    /// Allocate and randomize `count` agents inside the viewport.
    ///
    /// Each agent gets a random position, a random heading converted to a
    /// unit velocity (with a matching rotation basis), a flock id in
    /// `[0, flock_count)` and bin id 0. Bins are not meaningful until the
    /// first dispatch assigns them.
    pub fn initialize(count: u32, screen_size: Vec2, flock_count: u32) -> Self {
        let mut store = Self {
            count,
            data: vec![0.0; count as usize * FLOATS_PER_BOID],
        };

        let mut rng = rand::thread_rng();
        for i in 0..count as usize {
            let angle = rng.gen::<f32>() * std::f32::consts::TAU;
            let pos = Vec2::new(
                rng.gen::<f32>() * screen_size.x,
                rng.gen::<f32>() * screen_size.y,
            );
            let vel = Vec2::new(angle.cos(), angle.sin());
            let flock = rng.gen_range(0..flock_count.max(1)) as f32;
            store.write_record(i, pos, vel, flock, 0.0);
        }
        store
    }

    /// Number of agents in the store.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Packed little-endian byte view consumed by the pipeline.
    pub fn as_bytes(&self) -> &[u8] {
        cast_slice(&self.data)
    }

    /// Overwrite the store with the device's output for the completed
    /// step. The device output is authoritative; the only validation is
    /// byte-length equality, and a mismatch is fatal to the frame loop.
    pub fn apply(&mut self, bytes: &[u8]) -> Result<(), PipelineError> {
        let expected = self.data.len() * 4;
        if bytes.len() != expected {
            return Err(PipelineError::SizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        // Read-back slices carry no alignment guarantee, so decode the
        // little-endian words instead of reinterpreting the slice.
        for (slot, chunk) in self.data.iter_mut().zip(bytes.chunks_exact(4)) {
            *slot = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(())
    }

    /// Position of agent `i`.
    pub fn position(&self, i: usize) -> Vec2 {
        let base = i * FLOATS_PER_BOID;
        Vec2::new(self.data[base + OFF_POS_X], self.data[base + OFF_POS_Y])
    }

    /// Velocity of agent `i`.
    pub fn velocity(&self, i: usize) -> Vec2 {
        let base = i * FLOATS_PER_BOID;
        Vec2::new(self.data[base + OFF_VEL_X], self.data[base + OFF_VEL_Y])
    }

    /// Flock id of agent `i`.
    pub fn flock(&self, i: usize) -> u32 {
        self.data[i * FLOATS_PER_BOID + OFF_FLOCK] as u32
    }

    /// Spatial bin id of agent `i`, as of the last completed step.
    pub fn bin(&self, i: usize) -> u32 {
        self.data[i * FLOATS_PER_BOID + OFF_BIN] as u32
    }

    /// Per-instance transforms for the render collaborator.
    pub fn instances(&self) -> impl Iterator<Item = InstanceTransform> + '_ {
        (0..self.count as usize).map(|i| InstanceTransform {
            position: self.position(i),
            heading: self.velocity(i),
        })
    }

    /// Place agent `i` deterministically. Intended for collaborators and
    /// tests that need a known starting state; `velocity` should be a
    /// unit heading.
    pub fn set_agent(&mut self, i: usize, position: Vec2, velocity: Vec2, flock: u32) {
        let bin = self.data[i * FLOATS_PER_BOID + OFF_BIN];
        self.write_record(i, position, velocity, flock as f32, bin);
    }

    fn write_record(&mut self, i: usize, pos: Vec2, vel: Vec2, flock: f32, bin: f32) {
        let base = i * FLOATS_PER_BOID;
        let rec = &mut self.data[base..base + FLOATS_PER_BOID];
        // Basis columns of a rotation by the heading angle.
        rec[OFF_BASIS_XX] = vel.x;
        rec[OFF_BASIS_YX] = -vel.y;
        rec[OFF_POS_X] = pos.x;
        rec[OFF_BASIS_XY] = vel.y;
        rec[OFF_BASIS_YY] = vel.x;
        rec[OFF_POS_Y] = pos.y;
        for c in rec.iter_mut().skip(OFF_COLOR).take(4) {
            *c = 1.0;
        }
        rec[OFF_VEL_X] = vel.x;
        rec[OFF_VEL_Y] = vel.y;
        rec[OFF_FLOCK] = flock;
        rec[OFF_BIN] = bin;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: Vec2 = Vec2::new(800.0, 600.0);

    #[test]
    fn test_buffer_length_matches_stride() {
        for count in [256u32, 320, 1024, 4096] {
            let store = BoidStateStore::initialize(count, SCREEN, 1);
            assert_eq!(store.as_bytes().len(), count as usize * BYTES_PER_BOID);
        }
    }

    #[test]
    fn test_initialize_ranges() {
        let store = BoidStateStore::initialize(512, SCREEN, 3);
        for i in 0..512 {
            let pos = store.position(i);
            assert!(pos.x >= 0.0 && pos.x < SCREEN.x);
            assert!(pos.y >= 0.0 && pos.y < SCREEN.y);
            // Headings are unit vectors.
            assert!((store.velocity(i).length() - 1.0).abs() < 1e-4);
            assert!(store.flock(i) < 3);
            assert_eq!(store.bin(i), 0);
        }
    }

    #[test]
    fn test_apply_rejects_length_mismatch() {
        let mut store = BoidStateStore::initialize(256, SCREEN, 1);
        let short = vec![0u8; 255 * BYTES_PER_BOID];
        match store.apply(&short) {
            Err(PipelineError::SizeMismatch { expected, actual }) => {
                assert_eq!(expected, 256 * BYTES_PER_BOID);
                assert_eq!(actual, 255 * BYTES_PER_BOID);
            }
            other => panic!("expected SizeMismatch, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_apply_accepts_misaligned_bytes() {
        let mut store = BoidStateStore::initialize(256, SCREEN, 1);
        let reference = BoidStateStore::initialize(256, SCREEN, 2);

        // Stage the device output one byte off a word boundary.
        let mut backing = vec![0u8; reference.as_bytes().len() + 1];
        backing[1..].copy_from_slice(reference.as_bytes());

        store.apply(&backing[1..]).unwrap();
        assert_eq!(store.as_bytes(), reference.as_bytes());
    }

    #[test]
    fn test_apply_roundtrip() {
        let mut a = BoidStateStore::initialize(256, SCREEN, 2);
        let b = BoidStateStore::initialize(256, SCREEN, 2);
        a.apply(b.as_bytes()).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_set_agent_and_instances() {
        let mut store = BoidStateStore::initialize(256, SCREEN, 1);
        store.set_agent(7, Vec2::new(100.0, 200.0), Vec2::new(0.0, 1.0), 0);

        let inst: Vec<_> = store.instances().collect();
        assert_eq!(inst.len(), 256);
        assert_eq!(inst[7].position, Vec2::new(100.0, 200.0));
        assert_eq!(inst[7].heading, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_basis_matches_heading() {
        let mut store = BoidStateStore::initialize(256, SCREEN, 1);
        let heading = Vec2::new(0.6, 0.8);
        store.set_agent(0, Vec2::ZERO, heading, 0);

        let bytes = store.as_bytes();
        let floats: &[f32] = bytemuck::cast_slice(bytes);
        assert_eq!(floats[OFF_BASIS_XX], heading.x);
        assert_eq!(floats[OFF_BASIS_YX], -heading.y);
        assert_eq!(floats[OFF_BASIS_XY], heading.y);
        assert_eq!(floats[OFF_BASIS_YY], heading.x);
    }
}
