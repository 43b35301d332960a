//! Error types for the simulation core.
//!
//! Every variant here is fatal to the frame loop: the design favors
//! crash-fast over silently corrupting shared host/device state. There is
//! no retry or partial-frame recovery anywhere in the crate.

use std::fmt;

/// Errors raised by the compute device pipeline and the frame orchestrator.
#[derive(Debug)]
pub enum PipelineError {
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    Device(wgpu::RequestDeviceError),
    /// Kernel failed shader validation/compilation.
    Kernel(String),
    /// Failed to map a staging buffer for read-back.
    BufferMapping(String),
    /// A host byte buffer does not match its device allocation.
    SizeMismatch { expected: usize, actual: usize },
    /// `init` was called on a pipeline that is already initialized.
    AlreadyInitialized,
    /// A frame operation was attempted before `init`/`allocate_buffers`.
    Uninitialized,
    /// A frame operation was attempted after `free`.
    Freed,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::NoAdapter => write!(
                f,
                "No compatible GPU adapter found. Ensure your system has a GPU with Vulkan/Metal/DX12 support."
            ),
            PipelineError::Device(e) => write!(f, "Failed to create GPU device: {}", e),
            PipelineError::Kernel(msg) => write!(f, "Kernel compilation failed: {}", msg),
            PipelineError::BufferMapping(msg) => write!(f, "Failed to map GPU buffer: {}", msg),
            PipelineError::SizeMismatch { expected, actual } => write!(
                f,
                "Buffer size mismatch: allocation holds {} bytes, host provided {}",
                expected, actual
            ),
            PipelineError::AlreadyInitialized => {
                write!(f, "Pipeline is already initialized; init must be called exactly once")
            }
            PipelineError::Uninitialized => {
                write!(f, "Pipeline is not initialized; call init and allocate_buffers first")
            }
            PipelineError::Freed => write!(f, "Pipeline has been freed and cannot be reused"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::RequestDeviceError> for PipelineError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        PipelineError::Device(e)
    }
}
