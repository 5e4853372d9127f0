//! Borrowed device/queue pair handed to every gfx operation.

/// Gfx-facing context (device + queue).
///
/// Resource operations borrow this instead of reaching for any global state,
/// so a registry can be driven by a windowed device, a headless device, or a
/// test device interchangeably.
#[derive(Copy, Clone)]
pub struct GfxCtx<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
}

impl<'a> GfxCtx<'a> {
    #[inline]
    pub fn new(device: &'a wgpu::Device, queue: &'a wgpu::Queue) -> Self {
        Self { device, queue }
    }
}
