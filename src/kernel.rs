//! The neighbor-interaction compute kernel and its host/kernel ABI.
//!
//! The binding-index table and the buffer layouts are the contract; the
//! WGSL body is one valid implementation of it. Indices must never be
//! renumbered; a simplified kernel variant may omit bindings it does not
//! use, but the remaining indices keep their slots.

/// Workgroup size declared by the kernel. The host dispatches
/// `ceil(count / WORKGROUP_SIZE)` groups and does not pad the tail; the
/// kernel guards out-of-range indices itself.
pub const WORKGROUP_SIZE: u32 = 64;

/// Fixed binding-index map agreed with the kernel.
pub mod binding {
    /// Read-only snapshot of agent records.
    pub const AGENTS_IN: u32 = 0;
    /// Writable agent output records.
    pub const AGENTS_OUT: u32 = 1;
    /// Prior-frame bin assignments (read).
    pub const HASH_LOOKUP: u32 = 2;
    /// Current-frame bin assignments (write).
    pub const HASH_UPDATE: u32 = 3;
    /// Per-cell occupancy counters (atomic).
    pub const HASH_SIZE: u32 = 4;
    /// Global parameter block.
    pub const GLOBALS: u32 = 5;
}

/// WGSL source for the flocking kernel.
///
/// Agent records are 16 floats; see `boids.rs` for the offsets. The
/// globals struct mirrors `GlobalParams` field for field. Neighbor
/// search scans the 3x3 block of cells around the agent through the
/// prior-frame lookup buffer and only reacts to agents of the same
/// flock within visual range. New bins are inserted into the update
/// buffer via an atomically reserved slot; agents past a cell's capacity
/// are dropped from that cell for the frame.
pub const BOID_KERNEL_WGSL: &str = r#"
const STRIDE: u32 = 16u;
const CELL_EDGE: f32 = 60.0;
const CELL_CAPACITY: i32 = 64;

struct Globals {
    visual_range: f32,
    separation_distance: f32,
    separation_weight: f32,
    alignment_weight: f32,
    cohesion_weight: f32,
    movement_speed: f32,
    boid_count: f32,
    boundary_width: f32,
    boundary_enabled: f32,
    screen_width: f32,
    screen_height: f32,
    boundary_turn: f32,
    delta_time: f32,
};

@group(0) @binding(0) var<storage, read> agents_in: array<f32>;
@group(0) @binding(1) var<storage, read_write> agents_out: array<f32>;
@group(0) @binding(2) var<storage, read> hash_lookup: array<i32>;
@group(0) @binding(3) var<storage, read_write> hash_update: array<i32>;
@group(0) @binding(4) var<storage, read_write> hash_size: array<atomic<i32>>;
@group(0) @binding(5) var<storage, read> globals: Globals;

fn agent_position(base: u32) -> vec2<f32> {
    return vec2<f32>(agents_in[base + 3u], agents_in[base + 7u]);
}

fn agent_velocity(base: u32) -> vec2<f32> {
    return vec2<f32>(agents_in[base + 12u], agents_in[base + 13u]);
}

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let idx = global_id.x;
    let count = u32(globals.boid_count);
    if idx >= count {
        return;
    }

    let base = idx * STRIDE;
    var pos = agent_position(base);
    var vel = agent_velocity(base);
    let flock = agents_in[base + 14u];

    let columns = u32(ceil(globals.screen_width / CELL_EDGE));
    let rows = u32(ceil(globals.screen_height / CELL_EDGE));

    // Scan the 3x3 neighborhood of the agent's cell through the
    // prior-frame lookup buffer.
    var separation = vec2<f32>(0.0, 0.0);
    var velocity_sum = vec2<f32>(0.0, 0.0);
    var position_sum = vec2<f32>(0.0, 0.0);
    var neighbors = 0.0;

    let my_column = i32(floor(pos.x / CELL_EDGE));
    let my_row = i32(floor(pos.y / CELL_EDGE));

    for (var dr: i32 = -1; dr <= 1; dr = dr + 1) {
        for (var dc: i32 = -1; dc <= 1; dc = dc + 1) {
            let row = my_row + dr;
            let column = my_column + dc;
            if row < 0 || column < 0 || row >= i32(rows) || column >= i32(columns) {
                continue;
            }
            let cell = u32(row) * columns + u32(column);
            for (var slot: u32 = 0u; slot < u32(CELL_CAPACITY); slot = slot + 1u) {
                let other = hash_lookup[cell * u32(CELL_CAPACITY) + slot];
                if other < 0 || u32(other) == idx {
                    continue;
                }
                let other_base = u32(other) * STRIDE;
                if agents_in[other_base + 14u] != flock {
                    continue;
                }
                let other_pos = agent_position(other_base);
                let dist = distance(pos, other_pos);
                if dist >= globals.visual_range {
                    continue;
                }
                if dist < globals.separation_distance {
                    separation = separation + (pos - other_pos);
                }
                velocity_sum = velocity_sum + agent_velocity(other_base);
                position_sum = position_sum + other_pos;
                neighbors = neighbors + 1.0;
            }
        }
    }

    if neighbors > 0.0 {
        let mean_velocity = velocity_sum / neighbors;
        let mean_position = position_sum / neighbors;
        vel = vel + (mean_velocity - vel) * globals.alignment_weight;
        vel = vel + (mean_position - pos) * globals.cohesion_weight;
    }
    vel = vel + separation * globals.separation_weight;

    // Soft boundary: steer back inside the margin when enabled.
    if globals.boundary_enabled > 0.5 {
        let margin = globals.boundary_width;
        if pos.x < margin {
            vel.x = vel.x + globals.boundary_turn;
        }
        if pos.x > globals.screen_width - margin {
            vel.x = vel.x - globals.boundary_turn;
        }
        if pos.y < margin {
            vel.y = vel.y + globals.boundary_turn;
        }
        if pos.y > globals.screen_height - margin {
            vel.y = vel.y - globals.boundary_turn;
        }
    }

    // Keep the heading at unit length without disturbing slower agents.
    let speed = length(vel);
    if speed > 1.0 {
        vel = vel / speed;
    }

    pos = pos + vel * (globals.movement_speed * globals.delta_time);

    // Toroidal wrap when the boundary is disabled. A position exactly at
    // the screen extent maps to zero.
    if globals.boundary_enabled <= 0.5 {
        if pos.x >= globals.screen_width {
            pos.x = pos.x - globals.screen_width;
        }
        if pos.x < 0.0 {
            pos.x = pos.x + globals.screen_width;
        }
        if pos.y >= globals.screen_height {
            pos.y = pos.y - globals.screen_height;
        }
        if pos.y < 0.0 {
            pos.y = pos.y + globals.screen_height;
        }
    }

    // New bin assignment, clamped into range at the screen extents.
    let bin_column = min(u32(max(pos.x, 0.0) / CELL_EDGE), columns - 1u);
    let bin_row = min(u32(max(pos.y, 0.0) / CELL_EDGE), rows - 1u);
    let bin = bin_row * columns + bin_column;

    let reserved = atomicAdd(&hash_size[bin], 1);
    if reserved < CELL_CAPACITY {
        hash_update[bin * u32(CELL_CAPACITY) + u32(reserved)] = i32(idx);
    }

    // Rotation basis for the instance transform, rebuilt from the heading.
    var heading = vec2<f32>(1.0, 0.0);
    if speed > 1e-5 {
        heading = vel / length(vel);
    }

    agents_out[base + 0u] = heading.x;
    agents_out[base + 1u] = -heading.y;
    agents_out[base + 2u] = 0.0;
    agents_out[base + 3u] = pos.x;
    agents_out[base + 4u] = heading.y;
    agents_out[base + 5u] = heading.x;
    agents_out[base + 6u] = 0.0;
    agents_out[base + 7u] = pos.y;
    agents_out[base + 8u] = agents_in[base + 8u];
    agents_out[base + 9u] = agents_in[base + 9u];
    agents_out[base + 10u] = agents_in[base + 10u];
    agents_out[base + 11u] = agents_in[base + 11u];
    agents_out[base + 12u] = vel.x;
    agents_out[base + 13u] = vel.y;
    agents_out[base + 14u] = flock;
    agents_out[base + 15u] = f32(bin);
}
"#;
