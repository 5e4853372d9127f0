//! Off-screen render targets.
//!
//! A framebuffer is a list of attachment textures created from a format list.
//! Render-target textures cannot be resized in place, so `resize` tears every
//! attachment down and recreates it at the new size with the original formats
//! and clear color.

use super::context::GfxCtx;
use super::error::GfxError;
use super::format::AttachmentFormat;
use super::texture::{plan_texture, Texture};

/// Splits an attachment format list into color formats + the single optional
/// depth/stencil format.
///
/// Order among color attachments is preserved (it defines the attachment
/// slots shaders write to). A second depth/stencil entry is a configuration
/// error, as is an empty list.
pub fn split_attachments(
    formats: &[AttachmentFormat],
) -> Result<(Vec<AttachmentFormat>, Option<AttachmentFormat>), GfxError> {
    if formats.is_empty() {
        return Err(GfxError::EmptyAttachmentList);
    }

    let mut color = Vec::new();
    let mut depth = None;
    for &format in formats {
        if format.is_depth_stencil() {
            if depth.is_some() {
                return Err(GfxError::DoubleDepthAttachment);
            }
            depth = Some(format);
        } else {
            color.push(format);
        }
    }
    Ok((color, depth))
}

/// Multi-attachment off-screen render target.
pub struct Framebuffer {
    label: String,
    size: (u32, u32),
    clear_color: wgpu::Color,
    formats: Vec<AttachmentFormat>,
    color: Vec<(AttachmentFormat, Texture)>,
    depth: Option<(AttachmentFormat, Texture)>,
    /// Bumped whenever the attachments are recreated; bind groups referencing
    /// them compare this to know when to rebuild.
    revision: u64,
}

impl Framebuffer {
    pub fn new(
        ctx: &GfxCtx<'_>,
        label: &str,
        size: (u32, u32),
        clear_color: wgpu::Color,
        formats: &[AttachmentFormat],
        max_dimension: u32,
    ) -> Result<Self, GfxError> {
        let mut fb = Self {
            label: label.to_string(),
            size,
            clear_color,
            formats: formats.to_vec(),
            color: Vec::new(),
            depth: None,
            revision: 0,
        };
        fb.create_attachments(ctx, max_dimension)?;
        Ok(fb)
    }

    fn create_attachments(&mut self, ctx: &GfxCtx<'_>, max_dimension: u32) -> Result<(), GfxError> {
        let (color_formats, depth_format) = split_attachments(&self.formats)?;
        let plan = plan_texture(self.size.0, self.size.1, max_dimension);

        self.color = color_formats
            .iter()
            .enumerate()
            .map(|(i, &format)| {
                let texture = Texture::new(
                    ctx,
                    &format!("{} color{}", self.label, i),
                    plan,
                    format.wgpu_format(),
                    wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                );
                (format, texture)
            })
            .collect();

        self.depth = depth_format.map(|format| {
            let texture = Texture::new(
                ctx,
                &format!("{} depth", self.label),
                plan,
                format.wgpu_format(),
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            );
            (format, texture)
        });

        log::debug!(
            "framebuffer '{}': {}x{}, {} color + {} depth attachment(s)",
            self.label,
            self.size.0,
            self.size.1,
            self.color.len(),
            self.depth.is_some() as u32,
        );
        Ok(())
    }

    /// Recreates every attachment at `new_size`. The format list and clear
    /// color are preserved.
    pub fn resize(
        &mut self,
        ctx: &GfxCtx<'_>,
        new_size: (u32, u32),
        max_dimension: u32,
    ) -> Result<(), GfxError> {
        self.size = new_size;
        self.revision += 1;
        // Old textures drop here; wgpu reclaims them once in-flight work ends.
        self.create_attachments(ctx, max_dimension)
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn formats(&self) -> &[AttachmentFormat] {
        &self.formats
    }

    pub fn clear_color(&self) -> wgpu::Color {
        self.clear_color
    }

    /// Color target formats in slot order, for pipeline creation.
    pub fn color_formats(&self) -> Vec<wgpu::TextureFormat> {
        self.color.iter().map(|(f, _)| f.wgpu_format()).collect()
    }

    pub fn depth_format(&self) -> Option<wgpu::TextureFormat> {
        self.depth.as_ref().map(|(f, _)| f.wgpu_format())
    }

    pub fn color_attachment(&self, slot: usize) -> Option<&Texture> {
        self.color.get(slot).map(|(_, t)| t)
    }

    pub fn depth_attachment(&self) -> Option<&Texture> {
        self.depth.as_ref().map(|(_, t)| t)
    }

    /// Begins a render pass clearing every attachment.
    pub fn begin_pass<'e>(&self, encoder: &'e mut wgpu::CommandEncoder) -> wgpu::RenderPass<'e> {
        let color_attachments: Vec<_> = self
            .color
            .iter()
            .map(|(_, texture)| {
                Some(wgpu::RenderPassColorAttachment {
                    view: texture.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let depth_stencil_attachment =
            self.depth.as_ref().map(|(format, texture)| wgpu::RenderPassDepthStencilAttachment {
                view: texture.view(),
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: matches!(format, AttachmentFormat::Depth24PlusStencil8).then(|| {
                    wgpu::Operations {
                        load: wgpu::LoadOp::Clear(0),
                        store: wgpu::StoreOp::Store,
                    }
                }),
            });

        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&self.label),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::testutil;

    use AttachmentFormat as A;

    // ── attachment validation (pure) ──────────────────────────────────────

    #[test]
    fn splits_colors_and_depth_in_order() {
        let (color, depth) =
            split_attachments(&[A::Rgba32Float, A::Rgba32Float, A::Depth24PlusStencil8]).unwrap();
        assert_eq!(color, vec![A::Rgba32Float, A::Rgba32Float]);
        assert_eq!(depth, Some(A::Depth24PlusStencil8));
    }

    #[test]
    fn second_depth_attachment_is_rejected() {
        let err = split_attachments(&[A::Depth32Float, A::Rgba8Unorm, A::Depth24PlusStencil8]);
        assert!(matches!(err, Err(GfxError::DoubleDepthAttachment)));
    }

    #[test]
    fn empty_list_is_rejected() {
        assert!(matches!(split_attachments(&[]), Err(GfxError::EmptyAttachmentList)));
    }

    // ── create / resize (needs a device) ──────────────────────────────────

    #[test]
    fn resize_preserves_formats_and_reports_new_size() {
        let Some(gpu) = testutil::gpu() else { return };
        let ctx = gpu.ctx();

        let formats = [A::Rgba32Float, A::Rgba32Float, A::Depth24PlusStencil8];
        let mut fb = Framebuffer::new(
            &ctx,
            "test",
            (64, 64),
            wgpu::Color::BLACK,
            &formats,
            8192,
        )
        .unwrap();

        fb.resize(&ctx, (128, 32), 8192).unwrap();
        assert_eq!(fb.size(), (128, 32));
        assert_eq!(fb.formats(), &formats);
        assert_eq!(fb.color_formats().len(), 2);
        assert_eq!(fb.depth_format(), Some(wgpu::TextureFormat::Depth24PlusStencil8));
    }
}
