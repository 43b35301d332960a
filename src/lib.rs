//! # Murmur
//!
//! CPU-side orchestration core for a GPU-computed boid flocking
//! simulation. Each frame, the per-agent neighbor interaction runs as a
//! single compute dispatch; this crate owns everything around that
//! kernel: packing simulation state into its fixed binary layout,
//! maintaining the spatial hash index that bounds neighbor search,
//! managing device buffers across frames, and the synchronous
//! host/device handoff.
//!
//! ## Quick start
//!
//! ```ignore
//! use murmur::{FrameOrchestrator, SimConfig};
//! use glam::Vec2;
//!
//! let config = SimConfig::new(Vec2::new(1920.0, 1080.0))
//!     .with_boid_count(16_384);
//!
//! let mut sim = FrameOrchestrator::new(&config);
//! loop {
//!     sim.step(&config)?;
//!     for instance in sim.store().instances() {
//!         // hand position/heading to the renderer
//!     }
//! }
//! ```
//!
//! ## Frame model
//!
//! Host and device strictly alternate: host writes, submit, blocking
//! wait, host reads. The wait inside `dispatch` is the only
//! synchronization primitive; there is no frame pipelining and no
//! concurrent access to any device buffer. Rendering, UI parameter
//! panels and fps display are external collaborators: they mutate
//! [`SimConfig`] and read [`BoidStateStore::instances`].
//!
//! ## Wire contract
//!
//! Every buffer crossing the host/device boundary is a fixed-order
//! little-endian array of 4-byte scalars. Agent records are 16 floats
//! (see [`boids`]), globals are 13 floats (see [`globals`]), and the
//! binding-index table in [`kernel::binding`] is the host/kernel ABI.

pub mod boids;
pub mod config;
pub mod error;
pub mod frame;
pub mod globals;
pub mod grid;
pub mod kernel;
pub mod pipeline;
pub mod time;

pub use boids::{BoidStateStore, InstanceTransform, BYTES_PER_BOID, FLOATS_PER_BOID};
pub use config::SimConfig;
pub use error::PipelineError;
pub use frame::FrameOrchestrator;
pub use globals::GlobalParams;
pub use grid::{GridDimensions, SpatialHashGrid, CELL_CAPACITY, CELL_EDGE, EMPTY_SLOT};
pub use kernel::{BOID_KERNEL_WGSL, WORKGROUP_SIZE};
pub use pipeline::{ComputeDevicePipeline, FrameBuffers, FrameResults, PipelineState};
pub use time::FrameClock;

pub use glam::Vec2;
