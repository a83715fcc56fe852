//! Platform backends. Only the headless one is built in; real outputs
//! plug in through the `DisplayBuffer` and `Renderer` traits.

pub mod headless;

pub use headless::{CountingRenderer, HeadlessDisplayBuffer, Post};
