//! Buffer arbitration and per-output compositing

pub mod arbiter;
pub mod buffer;
pub mod bypass;
pub mod display_buffer_compositor;
pub mod multi_threaded;
pub mod occlusion;
pub mod renderable;
pub mod report;
pub mod schedule;
pub mod stream;

pub use arbiter::{CompositorId, MultiMonitorArbiter, DEFAULT_EXPECTED_CONSUMERS};
pub use buffer::{Buffer, BufferId, SoftwareBuffer};
pub use display_buffer_compositor::{
    DisplayBuffer, DisplayBufferCompositor, Orientation, Renderer,
};
pub use multi_threaded::{CompositorOutput, MultiThreadedCompositor};
pub use renderable::{Renderable, Scene};
pub use report::{CompositorReport, FrameStats, LoggingCompositorReport, NullCompositorReport};
pub use schedule::{DroppingSchedule, QueueingSchedule, Schedule};
pub use stream::BufferStream;
