//! Live-tunable simulation parameters.
//!
//! External collaborators (a UI panel, an engine inspector) mutate one
//! explicit `SimConfig` and pass it by reference into every frame step.
//! Keeping the tunables in a single passed-in object makes every mutation
//! point auditable; the orchestrator holds no ambient parameter state.
//!
//! Agent count and screen size are also carried here, but they are only
//! read at setup: changing them after the store and grid are allocated has
//! no effect until a full rebuild.

use glam::Vec2;

/// Smallest supported agent population.
pub const MIN_BOIDS: u32 = 256;
/// Largest supported agent population.
pub const MAX_BOIDS: u32 = 96_000;
/// Agent counts are stepped in workgroup-sized increments.
pub const BOID_STEP: u32 = 64;

/// Tunable simulation parameters.
///
/// Use method chaining to adjust individual fields:
///
/// ```
/// use murmur::SimConfig;
/// use glam::Vec2;
///
/// let config = SimConfig::new(Vec2::new(1920.0, 1080.0))
///     .with_boid_count(4096)
///     .with_boundary_enabled(false);
/// ```
#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Number of simulated agents. Fixed once the store is allocated.
    pub boid_count: u32,
    /// Number of distinct flocks; agents only react to their own flock.
    pub flock_count: u32,
    /// Viewport size in world units.
    pub screen_size: Vec2,
    /// Radius within which neighbors are sensed.
    pub visual_range: f32,
    /// Distance below which neighbors repel.
    pub separation_distance: f32,
    /// Scalar on the per-frame travel distance.
    pub movement_speed: f32,
    /// Weight of the separation steering term.
    pub separation_weight: f32,
    /// Weight of the alignment steering term.
    pub alignment_weight: f32,
    /// Weight of the cohesion steering term.
    pub cohesion_weight: f32,
    /// When false, agents wrap around the screen instead of turning.
    pub boundary_enabled: bool,
    /// Inset of the turn-around margin from the screen edges.
    pub boundary_width: f32,
    /// Steering strength applied inside the boundary margin.
    pub boundary_turn: f32,
}

impl SimConfig {
    /// Create a configuration with default tunables for the given viewport.
    pub fn new(screen_size: Vec2) -> Self {
        Self {
            screen_size,
            ..Self::default()
        }
    }

    /// Set the agent count, clamped to the supported range and rounded
    /// down to the supported step.
    pub fn with_boid_count(mut self, count: u32) -> Self {
        let clamped = count.clamp(MIN_BOIDS, MAX_BOIDS);
        self.boid_count = clamped - clamped % BOID_STEP;
        self
    }

    /// Set the number of flocks (at least 1).
    pub fn with_flock_count(mut self, count: u32) -> Self {
        self.flock_count = count.max(1);
        self
    }

    /// Set the neighbor sensing radius.
    pub fn with_visual_range(mut self, range: f32) -> Self {
        self.visual_range = range;
        self
    }

    /// Set the separation distance.
    pub fn with_separation_distance(mut self, distance: f32) -> Self {
        self.separation_distance = distance;
        self
    }

    /// Set the movement speed scalar.
    pub fn with_movement_speed(mut self, speed: f32) -> Self {
        self.movement_speed = speed;
        self
    }

    /// Set the three behavior weights at once.
    pub fn with_weights(mut self, separation: f32, alignment: f32, cohesion: f32) -> Self {
        self.separation_weight = separation;
        self.alignment_weight = alignment;
        self.cohesion_weight = cohesion;
        self
    }

    /// Enable or disable the soft boundary. Disabled means toroidal wrap.
    pub fn with_boundary_enabled(mut self, enabled: bool) -> Self {
        self.boundary_enabled = enabled;
        self
    }

    /// Set the boundary margin inset.
    pub fn with_boundary_width(mut self, width: f32) -> Self {
        self.boundary_width = width;
        self
    }

    /// Set the boundary turn rate.
    pub fn with_boundary_turn(mut self, turn: f32) -> Self {
        self.boundary_turn = turn;
        self
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            boid_count: 64_000,
            flock_count: 1,
            screen_size: Vec2::new(1920.0, 1080.0),
            visual_range: 60.0,
            separation_distance: 8.0,
            movement_speed: 1.25,
            separation_weight: 0.05,
            alignment_weight: 0.05,
            cohesion_weight: 0.0005,
            boundary_enabled: true,
            boundary_width: -5.0,
            boundary_turn: 0.25,
        }
    }
}
