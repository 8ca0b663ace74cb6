use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::GpuError;
use crate::device_buffer::DeviceBuffer;

/// Shared ownership of device resources between a layer and its renderer.
pub type Shared<T> = Arc<T>;

/// Non-owning reference to a [`DeviceBuffer`].
///
/// The owner (a layer entry or a projection lookup table) is the lifetime
/// anchor. Once it drops the buffer the handle goes stale and [`upgrade`]
/// reports [`GpuError::StaleHandle`]; renderers must re-validate every frame.
///
/// [`upgrade`]: BufferHandle::upgrade
#[derive(Clone)]
pub struct BufferHandle {
    id: u64,
    buffer: Weak<DeviceBuffer>,
}

impl BufferHandle {
    pub fn new(buffer: &Shared<DeviceBuffer>) -> Self {
        Self {
            id: buffer.id(),
            buffer: Arc::downgrade(buffer),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_valid(&self) -> bool {
        self.buffer.strong_count() > 0
    }

    pub fn upgrade(&self) -> Result<Shared<DeviceBuffer>, GpuError> {
        self.buffer
            .upgrade()
            .ok_or(GpuError::StaleHandle { id: self.id })
    }
}

impl fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferHandle")
            .field("id", &self.id)
            .field("valid", &self.is_valid())
            .finish()
    }
}

impl PartialEq for BufferHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BufferHandle {}

/// Handle ID generator
static BUFFER_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_buffer_id() -> u64 {
    BUFFER_ID.fetch_add(1, Ordering::Relaxed)
}
