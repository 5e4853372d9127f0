use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract implemented by the program driving the engine.
pub trait App {
    /// Called once after the window and GPU exist, before the first frame.
    /// Load meshes, programs and instance buffers here.
    fn on_init(&mut self, ctx: &mut FrameCtx<'_, '_>) -> anyhow::Result<()>;

    /// Called once per rendered frame.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;

    /// Called when the drawable size changes, after the surface has been
    /// reconfigured.
    fn on_resize(&mut self, ctx: &mut FrameCtx<'_, '_>, size: (u32, u32)) {
        let _ = (ctx, size);
    }
}
