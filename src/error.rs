//! Contract violations raised by the compositor core.
//!
//! Everything in here is a caller bug: the subsystem that receives one logs
//! it at `error!` level and stops, it is never retried. Expected empty
//! outcomes (hit-test miss, no focus, an orphaned button-up) are not errors
//! and are reported through `Ok(false)` / `None` instead.

use crate::input::DeviceId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A compositor asked for a buffer before any was ever submitted
    #[error("no buffer to give to compositor")]
    NoBufferForCompositor,

    /// The snapshotter asked for a buffer before any was ever submitted
    #[error("no buffer to give to snapshotter")]
    NoBufferForSnapshot,

    #[error("input dispatcher got a non-input event")]
    NonInputEvent,

    #[error("key repeat for scan code {scan_code} on device {device:?} which is not pressed")]
    RepeatWithoutPress { device: DeviceId, scan_code: i32 },
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
