use winit::window::Window;

use crate::device::{Gpu, GpuFrame, SurfaceErrorAction};
use crate::gfx::GfxCtx;
use crate::input::Input;
use crate::time::FrameTime;

use super::app::AppControl;

/// Per-frame context passed to [`crate::core::App`] callbacks.
///
/// Lifetimes: `'a` is the callback invocation, `'w` the window borrow
/// carried by [`Gpu`].
pub struct FrameCtx<'a, 'w> {
    pub window: &'a Window,
    pub gpu: &'a mut Gpu<'w>,
    pub input: &'a Input,
    pub time: FrameTime,
}

impl FrameCtx<'_, '_> {
    /// Context for gfx resource operations.
    pub fn gfx_ctx(&self) -> GfxCtx<'_> {
        GfxCtx::new(self.gpu.device(), self.gpu.queue())
    }

    /// Drawable size in physical pixels.
    pub fn size(&self) -> (u32, u32) {
        let s = self.gpu.size();
        (s.width, s.height)
    }

    /// Acquires the surface, hands `draw` the frame, then submits and
    /// presents. Surface errors are absorbed: a lost/outdated surface skips
    /// the frame after reconfiguration and only OOM exits.
    pub fn render<F>(&mut self, draw: F) -> AppControl
    where
        F: FnOnce(&GfxCtx<'_>, &mut GpuFrame),
    {
        let mut frame = match self.gpu.begin_frame() {
            Ok(frame) => frame,
            Err(err) => {
                let action = self.gpu.handle_surface_error(err);
                log::warn!("surface error, action {action:?}");
                return match action {
                    SurfaceErrorAction::Fatal => AppControl::Exit,
                    _ => AppControl::Continue,
                };
            }
        };

        {
            let ctx = GfxCtx::new(self.gpu.device(), self.gpu.queue());
            draw(&ctx, &mut frame);
        }

        self.window.pre_present_notify();
        self.gpu.submit(frame);
        AppControl::Continue
    }
}
