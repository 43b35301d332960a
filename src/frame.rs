//! The per-frame orchestration sequence.
//!
//! A single logical thread drives the loop; there is no concurrent host
//! access to any device buffer. Each step: prepare host buffers, lazily
//! initialize the device on the first frame (otherwise re-upload),
//! dispatch with its implicit blocking wait, read results, publish the
//! agent output to the render-instance store, and adopt the returned
//! hash-update buffer as next frame's lookup.

use crate::boids::BoidStateStore;
use crate::config::SimConfig;
use crate::error::PipelineError;
use crate::globals::GlobalParams;
use crate::grid::SpatialHashGrid;
use crate::kernel::BOID_KERNEL_WGSL;
use crate::pipeline::{ComputeDevicePipeline, FrameBuffers, PipelineState};
use crate::time::FrameClock;

/// Drives the once-per-frame dispatch cycle.
///
/// The store and grid are allocated once from the configuration at
/// construction; device buffers are created lazily on the first `step`.
/// Changing the agent count or viewport after construction requires a
/// new orchestrator, not a resize.
pub struct FrameOrchestrator {
    pipeline: ComputeDevicePipeline,
    store: BoidStateStore,
    grid: SpatialHashGrid,
    clock: FrameClock,
}

impl FrameOrchestrator {
    /// Allocate host-side state for the configured population and
    /// viewport. No device work happens here.
    pub fn new(config: &SimConfig) -> Self {
        Self {
            pipeline: ComputeDevicePipeline::new(),
            store: BoidStateStore::initialize(
                config.boid_count,
                config.screen_size,
                config.flock_count,
            ),
            grid: SpatialHashGrid::new(config.screen_size),
            clock: FrameClock::new(),
        }
    }

    /// Run one simulation step.
    ///
    /// The configuration is read fresh every frame, so live tuning by an
    /// external UI takes effect on the next step. Any error terminates
    /// the frame loop; nothing here retries.
    pub fn step(&mut self, config: &SimConfig) -> Result<(), PipelineError> {
        let delta_time = self.clock.tick();
        let globals = GlobalParams::pack(config, delta_time);

        let frame = FrameBuffers {
            agents: self.store.as_bytes(),
            hash_lookup: self.grid.lookup_bytes(),
            hash_update: self.grid.update_bytes(),
            hash_size: self.grid.size_bytes(),
            globals: globals.as_bytes(),
        };

        if self.pipeline.state() == PipelineState::Uninitialized {
            self.pipeline.init(BOID_KERNEL_WGSL)?;
            self.pipeline.allocate_buffers(&frame)?;
        } else {
            self.pipeline.update_buffers(&frame)?;
        }

        self.pipeline.dispatch(self.store.count())?;
        let results = self.pipeline.read_results()?;

        self.store.apply(&results.agents)?;
        self.grid.adopt_update(&results.hash_update)?;
        Ok(())
    }

    /// The render-instance store: positions and headings for the frame
    /// just completed.
    pub fn store(&self) -> &BoidStateStore {
        &self.store
    }

    /// Mutable store access for collaborators that place agents.
    pub fn store_mut(&mut self) -> &mut BoidStateStore {
        &mut self.store
    }

    /// The spatial grid as of the last completed step.
    pub fn grid(&self) -> &SpatialHashGrid {
        &self.grid
    }

    /// Frame clock, e.g. to install a fixed delta.
    pub fn clock_mut(&mut self) -> &mut FrameClock {
        &mut self.clock
    }

    pub fn pipeline_state(&self) -> PipelineState {
        self.pipeline.state()
    }

    /// Release all device resources. Runs implicitly on drop as well.
    pub fn shutdown(&mut self) {
        self.pipeline.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn small_config() -> SimConfig {
        SimConfig::new(Vec2::new(640.0, 480.0)).with_boid_count(256)
    }

    #[test]
    fn test_new_orchestrator_has_no_device_state() {
        let orchestrator = FrameOrchestrator::new(&small_config());
        assert_eq!(orchestrator.pipeline_state(), PipelineState::Uninitialized);
        assert_eq!(orchestrator.store().count(), 256);
    }

    #[test]
    fn test_shutdown_without_init_is_safe() {
        let mut orchestrator = FrameOrchestrator::new(&small_config());
        orchestrator.shutdown();
        orchestrator.shutdown();
        assert_eq!(orchestrator.pipeline_state(), PipelineState::Freed);
    }

    #[test]
    fn test_step_after_shutdown_fails() {
        let mut orchestrator = FrameOrchestrator::new(&small_config());
        orchestrator.shutdown();
        assert!(matches!(
            orchestrator.step(&small_config()),
            Err(PipelineError::Freed)
        ));
    }
}
