//! Device-side storage for vantage draw layers.
//!
//! Buffers are held as [`Shared`] by their owner and referenced by renderers
//! through weak [`BufferHandle`]s.

pub mod device_buffer;
pub mod resource;

pub use device_buffer::DeviceBuffer;
pub use resource::{BufferHandle, Shared, next_buffer_id};

#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("Buffer shape mismatch: expected {expected} texels, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("Texel of {bytes} bytes is not made of f32 channels")]
    TexelSize { bytes: usize },
    #[error("Buffer has {expected} channels, requested {actual}")]
    ChannelMismatch { expected: u32, actual: u32 },
    #[error("Texel cast failed: {0:?}")]
    Cast(bytemuck::PodCastError),
    #[error("Buffer {id} has been released")]
    StaleHandle { id: u64 },
}
