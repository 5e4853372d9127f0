//! GPU device + surface management.
//!
//! Creates the wgpu instance/adapter/device/queue, configures the swapchain
//! and acquires frames. [`headless`] opens a device with no surface at all,
//! which is what compute-only sessions and the test suite use.

mod gpu;
mod headless;

pub use gpu::{Gpu, GpuFrame, GpuInit, SurfaceErrorAction};
pub use headless::headless;
