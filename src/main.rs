use glam::Vec2;
use murmur::{FrameOrchestrator, SimConfig};

fn main() {
    let config = SimConfig::new(Vec2::new(1920.0, 1080.0)).with_boid_count(16_384);

    let mut sim = FrameOrchestrator::new(&config);
    sim.clock_mut().set_fixed_delta(Some(1.0 / 60.0));

    for frame in 0..600 {
        if let Err(e) = sim.step(&config) {
            eprintln!("Frame {} failed: {}", frame, e);
            std::process::exit(1);
        }
        if frame % 60 == 0 {
            let sample = sim.store().position(0);
            println!("frame {:4}  boid[0] at ({:8.2}, {:8.2})", frame, sample.x, sample.y);
        }
    }

    sim.shutdown();
}
