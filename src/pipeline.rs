//! The compute device pipeline.
//!
//! Owns every device handle in the system: device, queue, compiled
//! kernel, the six storage buffers at their fixed bindings, the staging
//! buffers, the pipeline object and its bind group. No other component
//! holds or mutates any of them. All of it lives in one owning struct so
//! that `free` (and `Drop`) releases everything together on every exit
//! path, including setup failures.
//!
//! Host and device strictly alternate: host writes, submit, blocking
//! wait, host reads. The wait inside `dispatch` is the sole ordering
//! primitive: no fences or semaphores are exposed at this level, and
//! there is no frame pipelining. A stalled wait has no timeout or
//! cancellation; that is an accepted, unhandled failure mode.

use wgpu::util::DeviceExt;

use crate::error::PipelineError;
use crate::kernel::{binding, WORKGROUP_SIZE};

/// Observable pipeline lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Ready,
    Dispatching,
    Freed,
}

/// Borrowed host-side bytes for one frame's upload.
pub struct FrameBuffers<'a> {
    pub agents: &'a [u8],
    pub hash_lookup: &'a [u8],
    pub hash_update: &'a [u8],
    pub hash_size: &'a [u8],
    pub globals: &'a [u8],
}

/// Host copies of the device's output, read back after a dispatch.
pub struct FrameResults {
    /// Authoritative agent records for the completed step.
    pub agents: Vec<u8>,
    /// This frame's bin assignments, to be adopted as next frame's lookup.
    pub hash_update: Vec<u8>,
}

struct DeviceBuffers {
    agents_in: wgpu::Buffer,
    agents_out: wgpu::Buffer,
    hash_lookup: wgpu::Buffer,
    hash_update: wgpu::Buffer,
    hash_size: wgpu::Buffer,
    globals: wgpu::Buffer,
    agents_staging: wgpu::Buffer,
    hash_staging: wgpu::Buffer,
    // Allocation sizes; later uploads must match exactly.
    agents_len: usize,
    lookup_len: usize,
    update_len: usize,
    size_len: usize,
    globals_len: usize,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
}

struct DeviceContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    kernel: wgpu::ShaderModule,
    buffers: Option<DeviceBuffers>,
}

/// Owner of the compute device and the dispatch/synchronize/readback
/// cycle.
pub struct ComputeDevicePipeline {
    state: PipelineState,
    context: Option<DeviceContext>,
}

impl ComputeDevicePipeline {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Uninitialized,
            context: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Create the device context and compile the kernel.
    ///
    /// Must be called exactly once; a second call or a call after `free`
    /// is an error. Compile failures are fatal, there is no fallback.
    pub fn init(&mut self, kernel_source: &str) -> Result<(), PipelineError> {
        match self.state {
            PipelineState::Uninitialized => {}
            PipelineState::Freed => return Err(PipelineError::Freed),
            _ => return Err(PipelineError::AlreadyInitialized),
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(PipelineError::NoAdapter)?;

        let info = adapter.get_info();
        tracing::info!("compute adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Boid Compute Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))?;

        // Surface kernel validation failures as an error instead of a
        // deferred panic.
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let kernel = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Boid Kernel"),
            source: wgpu::ShaderSource::Wgsl(kernel_source.into()),
        });
        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(PipelineError::Kernel(e.to_string()));
        }

        self.context = Some(DeviceContext {
            device,
            queue,
            kernel,
            buffers: None,
        });
        self.state = PipelineState::Ready;
        tracing::debug!("pipeline initialized");
        Ok(())
    }

    /// Create device-resident storage for each logical buffer, bind them
    /// at the fixed binding map, and build the compute pipeline object.
    ///
    /// The agent output buffer starts as a copy of the input snapshot so
    /// the first read-back is well defined even for guarded-out indices.
    pub fn allocate_buffers(&mut self, frame: &FrameBuffers<'_>) -> Result<(), PipelineError> {
        if self.state == PipelineState::Freed {
            return Err(PipelineError::Freed);
        }
        let ctx = self.context.as_mut().ok_or(PipelineError::Uninitialized)?;

        let storage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;
        let readable = storage | wgpu::BufferUsages::COPY_SRC;

        let agents_in = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Agents In"),
            contents: frame.agents,
            usage: storage,
        });
        let agents_out = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Agents Out"),
            contents: frame.agents,
            usage: readable,
        });
        let hash_lookup = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Hash Lookup"),
            contents: frame.hash_lookup,
            usage: storage,
        });
        let hash_update = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Hash Update"),
            contents: frame.hash_update,
            usage: readable,
        });
        let hash_size = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Hash Size"),
            contents: frame.hash_size,
            usage: storage,
        });
        let globals = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Globals"),
            contents: frame.globals,
            usage: storage,
        });

        let agents_staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Agents Staging"),
            size: frame.agents.len() as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let hash_staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Hash Staging"),
            size: frame.hash_update.len() as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let pipeline = ctx
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Boid Pipeline"),
                layout: None,
                module: &ctx.kernel,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            });

        let layout = pipeline.get_bind_group_layout(0);
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Boid Bind Group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: binding::AGENTS_IN,
                    resource: agents_in.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: binding::AGENTS_OUT,
                    resource: agents_out.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: binding::HASH_LOOKUP,
                    resource: hash_lookup.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: binding::HASH_UPDATE,
                    resource: hash_update.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: binding::HASH_SIZE,
                    resource: hash_size.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: binding::GLOBALS,
                    resource: globals.as_entire_binding(),
                },
            ],
        });

        tracing::debug!(
            agents = frame.agents.len(),
            hash = frame.hash_lookup.len(),
            "device buffers allocated"
        );

        ctx.buffers = Some(DeviceBuffers {
            agents_in,
            agents_out,
            hash_lookup,
            hash_update,
            hash_size,
            globals,
            agents_staging,
            hash_staging,
            agents_len: frame.agents.len(),
            lookup_len: frame.hash_lookup.len(),
            update_len: frame.hash_update.len(),
            size_len: frame.hash_size.len(),
            globals_len: frame.globals.len(),
            pipeline,
            bind_group,
        });
        Ok(())
    }

    /// Re-upload current host bytes into the existing allocations.
    ///
    /// Nothing is reallocated; a length mismatch against the original
    /// allocation is fatal.
    pub fn update_buffers(&mut self, frame: &FrameBuffers<'_>) -> Result<(), PipelineError> {
        if self.state == PipelineState::Freed {
            return Err(PipelineError::Freed);
        }
        let ctx = self.context.as_ref().ok_or(PipelineError::Uninitialized)?;
        let bufs = ctx.buffers.as_ref().ok_or(PipelineError::Uninitialized)?;

        check_len(bufs.agents_len, frame.agents)?;
        check_len(bufs.lookup_len, frame.hash_lookup)?;
        check_len(bufs.update_len, frame.hash_update)?;
        check_len(bufs.size_len, frame.hash_size)?;
        check_len(bufs.globals_len, frame.globals)?;

        ctx.queue.write_buffer(&bufs.agents_in, 0, frame.agents);
        ctx.queue.write_buffer(&bufs.hash_lookup, 0, frame.hash_lookup);
        ctx.queue.write_buffer(&bufs.hash_update, 0, frame.hash_update);
        ctx.queue.write_buffer(&bufs.hash_size, 0, frame.hash_size);
        ctx.queue.write_buffer(&bufs.globals, 0, frame.globals);
        Ok(())
    }

    /// Submit one kernel dispatch covering `agent_count` agents, then
    /// block until the device has finished.
    ///
    /// The dispatch is 1-D with `ceil(agent_count / 64)` workgroups; the
    /// tail is not padded, the kernel guards out-of-range indices. The
    /// blocking wait guarantees host and device never touch the same
    /// buffer concurrently, at the cost of cross-frame pipelining.
    pub fn dispatch(&mut self, agent_count: u32) -> Result<(), PipelineError> {
        if self.state == PipelineState::Freed {
            return Err(PipelineError::Freed);
        }
        let ctx = self.context.as_ref().ok_or(PipelineError::Uninitialized)?;
        let bufs = ctx.buffers.as_ref().ok_or(PipelineError::Uninitialized)?;

        self.state = PipelineState::Dispatching;

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Boid Step"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Boid Dispatch"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&bufs.pipeline);
            pass.set_bind_group(0, &bufs.bind_group, &[]);
            pass.dispatch_workgroups(workgroup_count(agent_count), 1, 1);
        }
        encoder.copy_buffer_to_buffer(
            &bufs.agents_out,
            0,
            &bufs.agents_staging,
            0,
            bufs.agents_len as u64,
        );
        encoder.copy_buffer_to_buffer(
            &bufs.hash_update,
            0,
            &bufs.hash_staging,
            0,
            bufs.update_len as u64,
        );

        ctx.queue.submit(Some(encoder.finish()));
        ctx.device.poll(wgpu::Maintain::Wait);

        self.state = PipelineState::Ready;
        Ok(())
    }

    /// Copy the agent output and updated hash buffers back to host
    /// memory. The results become next frame's authoritative state.
    pub fn read_results(&mut self) -> Result<FrameResults, PipelineError> {
        if self.state == PipelineState::Freed {
            return Err(PipelineError::Freed);
        }
        let ctx = self.context.as_ref().ok_or(PipelineError::Uninitialized)?;
        let bufs = ctx.buffers.as_ref().ok_or(PipelineError::Uninitialized)?;

        let agents = read_staging(&ctx.device, &bufs.agents_staging)?;
        let hash_update = read_staging(&ctx.device, &bufs.hash_staging)?;
        Ok(FrameResults { agents, hash_update })
    }

    /// Release pipeline, bindings, buffers, kernel and device together.
    ///
    /// Idempotent: safe to call when never initialized or already freed.
    /// Also runs on `Drop`, so shutdown always releases the device.
    pub fn free(&mut self) {
        if self.context.take().is_some() {
            tracing::info!("compute device released");
        }
        self.state = PipelineState::Freed;
    }
}

impl Default for ComputeDevicePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ComputeDevicePipeline {
    fn drop(&mut self) {
        self.free();
    }
}

fn workgroup_count(agent_count: u32) -> u32 {
    agent_count.div_ceil(WORKGROUP_SIZE)
}

fn check_len(expected: usize, bytes: &[u8]) -> Result<(), PipelineError> {
    if bytes.len() != expected {
        return Err(PipelineError::SizeMismatch {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn read_staging(device: &wgpu::Device, staging: &wgpu::Buffer) -> Result<Vec<u8>, PipelineError> {
    let slice = staging.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::Maintain::Wait);

    match receiver.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(PipelineError::BufferMapping(e.to_string())),
        Err(_) => {
            return Err(PipelineError::BufferMapping(
                "map_async callback dropped without reporting".into(),
            ))
        }
    }

    let bytes = {
        let data = slice.get_mapped_range();
        data.to_vec()
    };
    staging.unmap();
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workgroup_count_ceils() {
        assert_eq!(workgroup_count(64), 1);
        assert_eq!(workgroup_count(65), 2);
        assert_eq!(workgroup_count(1), 1);
        assert_eq!(workgroup_count(6400), 100);
        assert_eq!(workgroup_count(6401), 101);
    }

    #[test]
    fn test_new_pipeline_is_uninitialized() {
        let pipeline = ComputeDevicePipeline::new();
        assert_eq!(pipeline.state(), PipelineState::Uninitialized);
    }

    #[test]
    fn test_free_before_init_is_noop() {
        let mut pipeline = ComputeDevicePipeline::new();
        pipeline.free();
        assert_eq!(pipeline.state(), PipelineState::Freed);
        assert!(pipeline.context.is_none());
    }

    #[test]
    fn test_free_is_idempotent() {
        let mut pipeline = ComputeDevicePipeline::new();
        pipeline.free();
        pipeline.free();
        assert_eq!(pipeline.state(), PipelineState::Freed);
        assert!(pipeline.context.is_none());
    }

    #[test]
    fn test_operations_after_free_fail() {
        let mut pipeline = ComputeDevicePipeline::new();
        pipeline.free();
        assert!(matches!(pipeline.init("unused"), Err(PipelineError::Freed)));
        assert!(matches!(pipeline.dispatch(64), Err(PipelineError::Freed)));
        assert!(matches!(pipeline.read_results(), Err(PipelineError::Freed)));
    }

    #[test]
    fn test_operations_before_init_fail() {
        let mut pipeline = ComputeDevicePipeline::new();
        assert!(matches!(
            pipeline.dispatch(64),
            Err(PipelineError::Uninitialized)
        ));
        assert!(matches!(
            pipeline.read_results(),
            Err(PipelineError::Uninitialized)
        ));
    }

    #[test]
    fn test_check_len() {
        assert!(check_len(4, &[0u8; 4]).is_ok());
        assert!(matches!(
            check_len(4, &[0u8; 5]),
            Err(PipelineError::SizeMismatch {
                expected: 4,
                actual: 5
            })
        ));
    }
}
