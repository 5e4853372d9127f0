//! Glint engine crate.
//!
//! A thin real-time rendering helper built on wgpu + winit. The heart of the
//! crate is [`gfx`]: GPU resource registries (buffers, textures, framebuffers,
//! mesh stores, shader programs) plus an instanced draw dispatcher designed to
//! keep per-frame GPU call counts low.

pub mod device;
pub mod window;
pub mod input;
pub mod time;
pub mod core;

pub mod logging;
pub mod gfx;
pub mod camera;
