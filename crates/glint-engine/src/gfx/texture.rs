//! Texture creation and image loading.

use std::path::Path;

use super::context::GfxCtx;
use super::error::GfxError;

/// GPU texture dimensionality chosen by [`plan_texture`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TextureKind {
    D1,
    D2,
    /// Logical width split across array layers because it exceeded the
    /// device's maximum single-texture dimension.
    D2Array,
}

/// Resolved shape of a texture before creation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TexturePlan {
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
}

impl TexturePlan {
    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: self.layers,
        }
    }

    pub fn dimension(&self) -> wgpu::TextureDimension {
        match self.kind {
            TextureKind::D1 => wgpu::TextureDimension::D1,
            TextureKind::D2 | TextureKind::D2Array => wgpu::TextureDimension::D2,
        }
    }

    pub fn view_dimension(&self) -> wgpu::TextureViewDimension {
        match self.kind {
            TextureKind::D1 => wgpu::TextureViewDimension::D1,
            TextureKind::D2 => wgpu::TextureViewDimension::D2,
            TextureKind::D2Array => wgpu::TextureViewDimension::D2Array,
        }
    }
}

/// Chooses dimensionality from a logical size.
///
/// Height below 2 selects a 1D texture. A width beyond `max_dimension` is
/// split across array layers (`layers = width / max`, rounded up), with
/// shaders recovering the logical x coordinate as `layer * max + x`.
pub fn plan_texture(width: u32, height: u32, max_dimension: u32) -> TexturePlan {
    let width = width.max(1);
    let height = height.max(1);

    if width > max_dimension {
        TexturePlan {
            kind: TextureKind::D2Array,
            width: max_dimension,
            height,
            layers: width.div_ceil(max_dimension),
        }
    } else if height < 2 {
        TexturePlan { kind: TextureKind::D1, width, height: 1, layers: 1 }
    } else {
        TexturePlan { kind: TextureKind::D2, width, height, layers: 1 }
    }
}

/// A texture plus its default view.
///
/// Format and shape are fixed at creation; "resizing" a texture means
/// creating a replacement (framebuffers do exactly that).
pub struct Texture {
    raw: wgpu::Texture,
    view: wgpu::TextureView,
    /// Depth-only view for combined depth-stencil formats; sampling such a
    /// texture requires a single-aspect view, while attaching it needs the
    /// full-aspect one.
    sample_view: Option<wgpu::TextureView>,
    plan: TexturePlan,
    format: wgpu::TextureFormat,
}

impl Texture {
    pub fn new(
        ctx: &GfxCtx<'_>,
        label: &str,
        plan: TexturePlan,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let raw = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: plan.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: plan.dimension(),
            format,
            usage,
            view_formats: &[],
        });
        let view = raw.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(plan.view_dimension()),
            ..Default::default()
        });
        let sample_view = (format == wgpu::TextureFormat::Depth24PlusStencil8).then(|| {
            raw.create_view(&wgpu::TextureViewDescriptor {
                dimension: Some(plan.view_dimension()),
                aspect: wgpu::TextureAspect::DepthOnly,
                ..Default::default()
            })
        });

        Self { raw, view, sample_view, plan, format }
    }

    /// Decodes an image file into an RGBA8 texture.
    ///
    /// The image is flipped vertically so v = 0 is the bottom row, matching
    /// the UV convention the procedural meshes use.
    pub fn load_image(ctx: &GfxCtx<'_>, path: &Path) -> Result<Self, GfxError> {
        let decoded = image::open(path).map_err(|source| GfxError::ImageDecode {
            path: path.to_path_buf(),
            source,
        })?;
        let rgba = decoded.flipv().to_rgba8();
        let (width, height) = rgba.dimensions();

        let plan = TexturePlan { kind: TextureKind::D2, width, height, layers: 1 };
        let texture = Self::new(
            ctx,
            &path.display().to_string(),
            plan,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );

        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.raw,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            plan.extent(),
        );

        log::info!("loaded texture {} ({}x{})", path.display(), width, height);
        Ok(texture)
    }

    pub fn raw(&self) -> &wgpu::Texture {
        &self.raw
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// View suitable for binding as a sampled texture.
    pub fn sample_view(&self) -> &wgpu::TextureView {
        self.sample_view.as_ref().unwrap_or(&self.view)
    }

    pub fn plan(&self) -> TexturePlan {
        self.plan
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── dimensionality planning ───────────────────────────────────────────

    #[test]
    fn flat_sizes_become_1d() {
        let plan = plan_texture(256, 1, 8192);
        assert_eq!(plan.kind, TextureKind::D1);
        assert_eq!((plan.width, plan.height, plan.layers), (256, 1, 1));
    }

    #[test]
    fn regular_sizes_become_2d() {
        let plan = plan_texture(800, 600, 8192);
        assert_eq!(plan.kind, TextureKind::D2);
        assert_eq!((plan.width, plan.height, plan.layers), (800, 600, 1));
    }

    #[test]
    fn oversized_width_is_split_into_layers() {
        let plan = plan_texture(20_000, 1, 8192);
        assert_eq!(plan.kind, TextureKind::D2Array);
        assert_eq!(plan.width, 8192);
        assert_eq!(plan.layers, 3);
    }

    #[test]
    fn exact_multiple_does_not_overallocate_layers() {
        let plan = plan_texture(16_384, 1, 8192);
        assert_eq!(plan.layers, 2);
    }

    #[test]
    fn zero_size_clamps_to_one() {
        let plan = plan_texture(0, 0, 8192);
        assert_eq!((plan.width, plan.height), (1, 1));
        assert_eq!(plan.kind, TextureKind::D1);
    }
}
