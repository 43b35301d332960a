//! Fixed-order global parameter block.
//!
//! A pure packing transform from the live configuration plus the current
//! frame delta into the scalar list the kernel reads. Fields are
//! positional on the device side, never named: adding, removing or
//! reordering a field changes the wire layout and is a breaking,
//! versioned change.

use bytemuck::{Pod, Zeroable};

use crate::config::SimConfig;

/// Wire layout version. Bump on any change to the field order below.
pub const GLOBALS_LAYOUT_VERSION: u32 = 1;

/// The global parameter pack, one `f32` per slot.
///
/// Field order is the byte-exact contract with the kernel.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GlobalParams {
    pub visual_range: f32,
    pub separation_distance: f32,
    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    pub movement_speed: f32,
    pub boid_count: f32,
    pub boundary_width: f32,
    pub boundary_enabled: f32,
    pub screen_width: f32,
    pub screen_height: f32,
    pub boundary_turn: f32,
    pub delta_time: f32,
}

impl GlobalParams {
    /// Pack the configuration and frame delta. No computation happens
    /// here beyond the bool-to-float conversion.
    pub fn pack(config: &SimConfig, delta_time: f32) -> Self {
        Self {
            visual_range: config.visual_range,
            separation_distance: config.separation_distance,
            separation_weight: config.separation_weight,
            alignment_weight: config.alignment_weight,
            cohesion_weight: config.cohesion_weight,
            movement_speed: config.movement_speed,
            boid_count: config.boid_count as f32,
            boundary_width: config.boundary_width,
            boundary_enabled: if config.boundary_enabled { 1.0 } else { 0.0 },
            screen_width: config.screen_size.x,
            screen_height: config.screen_size.y,
            boundary_turn: config.boundary_turn,
            delta_time,
        }
    }

    /// Byte view uploaded to the globals binding.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
