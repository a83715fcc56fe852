//! The buffer capability consumed by the compositor

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::geometry::Size;

/// Allocated in increasing order, so a larger id is a newer buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

impl BufferId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        BufferId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A client-produced buffer. Allocation and texture binding live behind
/// this trait; the core only hands buffers around. Holding an `Arc` to one
/// keeps it in use.
pub trait Buffer: Send + Sync + fmt::Debug {
    fn id(&self) -> BufferId;

    fn size(&self) -> Size;

    /// Whether the buffer can be scanned out directly
    fn can_bypass(&self) -> bool;
}

/// A plain in-memory buffer
#[derive(Debug)]
pub struct SoftwareBuffer {
    id: BufferId,
    size: Size,
    bypassable: bool,
}

impl SoftwareBuffer {
    pub fn new(size: Size) -> Self {
        Self {
            id: BufferId::next(),
            size,
            bypassable: false,
        }
    }

    /// A buffer in a scanout-capable format
    pub fn scanout(size: Size) -> Self {
        Self {
            bypassable: true,
            ..Self::new(size)
        }
    }
}

impl Buffer for SoftwareBuffer {
    fn id(&self) -> BufferId {
        self.id
    }

    fn size(&self) -> Size {
        self.size
    }

    fn can_bypass(&self) -> bool {
        self.bypassable
    }
}
