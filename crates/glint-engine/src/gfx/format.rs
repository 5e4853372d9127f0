//! Closed format mappings.
//!
//! Two closed enums cover every GPU format this crate will ever touch:
//! [`TexelFormat`] for per-instance texture-buffer elements and
//! [`AttachmentFormat`] for framebuffer attachments. Both are total mappings;
//! there is no "pick a default" path for an unlisted format, it simply cannot
//! be expressed.

use bytemuck::Pod;

/// Element format of a texture buffer.
///
/// Inferred from the compile-time element type through [`InstanceData`].
/// A 4x4 float matrix occupies four consecutive vec4 texels, matching how
/// shaders reconstruct it from `base + 4 * index` fetches.
///
/// Three-component elements are deliberately absent: their GPU-side stride
/// rules differ per backend, so callers pad to four components instead.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TexelFormat {
    R32Float,
    Rg32Float,
    Rgba32Float,
    R32Sint,
    R32Uint,
    Rgba32Sint,
    Rgba32Uint,
    /// 4x4 float matrix, stored as four Rgba32Float texels.
    Mat4,
}

impl TexelFormat {
    /// Size in bytes of one logical element.
    pub fn element_size(self) -> u64 {
        match self {
            TexelFormat::R32Float | TexelFormat::R32Sint | TexelFormat::R32Uint => 4,
            TexelFormat::Rg32Float => 8,
            TexelFormat::Rgba32Float | TexelFormat::Rgba32Sint | TexelFormat::Rgba32Uint => 16,
            TexelFormat::Mat4 => 64,
        }
    }

    /// Number of texels one logical element spans.
    pub fn texels_per_element(self) -> u64 {
        match self {
            TexelFormat::Mat4 => 4,
            _ => 1,
        }
    }

    /// WGSL element type a shader must use to read this buffer.
    pub fn wgsl_type(self) -> &'static str {
        match self {
            TexelFormat::R32Float => "f32",
            TexelFormat::Rg32Float => "vec2<f32>",
            TexelFormat::Rgba32Float => "vec4<f32>",
            TexelFormat::R32Sint => "i32",
            TexelFormat::R32Uint => "u32",
            TexelFormat::Rgba32Sint => "vec4<i32>",
            TexelFormat::Rgba32Uint => "vec4<u32>",
            TexelFormat::Mat4 => "mat4x4<f32>",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TexelFormat::R32Float => "R32Float",
            TexelFormat::Rg32Float => "Rg32Float",
            TexelFormat::Rgba32Float => "Rgba32Float",
            TexelFormat::R32Sint => "R32Sint",
            TexelFormat::R32Uint => "R32Uint",
            TexelFormat::Rgba32Sint => "Rgba32Sint",
            TexelFormat::Rgba32Uint => "Rgba32Uint",
            TexelFormat::Mat4 => "Mat4",
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Types usable as texture-buffer elements.
///
/// Sealed: the set of supported element shapes is closed, so an unsupported
/// type is a compile error rather than a runtime default.
pub trait InstanceData: Pod + sealed::Sealed {
    const FORMAT: TexelFormat;
}

macro_rules! instance_data {
    ($($ty:ty => $fmt:expr),+ $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}
            impl InstanceData for $ty {
                const FORMAT: TexelFormat = $fmt;
            }
        )+
    };
}

instance_data! {
    f32        => TexelFormat::R32Float,
    [f32; 2]   => TexelFormat::Rg32Float,
    [f32; 4]   => TexelFormat::Rgba32Float,
    i32        => TexelFormat::R32Sint,
    u32        => TexelFormat::R32Uint,
    [i32; 4]   => TexelFormat::Rgba32Sint,
    [u32; 4]   => TexelFormat::Rgba32Uint,
    glam::Vec2 => TexelFormat::Rg32Float,
    glam::Vec4 => TexelFormat::Rgba32Float,
    glam::Mat4 => TexelFormat::Mat4,
}

/// Framebuffer attachment format.
///
/// At most one depth/stencil variant may appear per framebuffer; the rest
/// become sequential color attachments in declaration order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AttachmentFormat {
    Rgba8Unorm,
    Rgba16Float,
    Rgba32Float,
    R32Float,
    Depth24PlusStencil8,
    Depth32Float,
}

impl AttachmentFormat {
    pub fn wgpu_format(self) -> wgpu::TextureFormat {
        match self {
            AttachmentFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            AttachmentFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            AttachmentFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            AttachmentFormat::R32Float => wgpu::TextureFormat::R32Float,
            AttachmentFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
            AttachmentFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        }
    }

    pub fn is_depth_stencil(self) -> bool {
        matches!(
            self,
            AttachmentFormat::Depth24PlusStencil8 | AttachmentFormat::Depth32Float
        )
    }

    /// Decomposition into the pieces bind-group creation needs: how a shader
    /// samples this attachment after the fact.
    pub fn sample_type(self) -> wgpu::TextureSampleType {
        match self {
            AttachmentFormat::Rgba8Unorm => wgpu::TextureSampleType::Float { filterable: true },
            // 16/32-bit float targets are not filterable without extra
            // features; composite passes fetch them with textureLoad.
            AttachmentFormat::Rgba16Float
            | AttachmentFormat::Rgba32Float
            | AttachmentFormat::R32Float => {
                wgpu::TextureSampleType::Float { filterable: false }
            }
            AttachmentFormat::Depth24PlusStencil8 | AttachmentFormat::Depth32Float => {
                wgpu::TextureSampleType::Depth
            }
        }
    }

    pub fn bytes_per_texel(self) -> u32 {
        match self {
            AttachmentFormat::Rgba8Unorm => 4,
            AttachmentFormat::R32Float => 4,
            AttachmentFormat::Depth24PlusStencil8 => 4,
            AttachmentFormat::Depth32Float => 4,
            AttachmentFormat::Rgba16Float => 8,
            AttachmentFormat::Rgba32Float => 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── texel formats ─────────────────────────────────────────────────────

    #[test]
    fn element_sizes_match_component_counts() {
        assert_eq!(TexelFormat::R32Float.element_size(), 4);
        assert_eq!(TexelFormat::Rg32Float.element_size(), 8);
        assert_eq!(TexelFormat::Rgba32Float.element_size(), 16);
        assert_eq!(TexelFormat::Mat4.element_size(), 64);
    }

    #[test]
    fn mat4_spans_four_texels() {
        assert_eq!(TexelFormat::Mat4.texels_per_element(), 4);
        assert_eq!(TexelFormat::Rgba32Float.texels_per_element(), 1);
    }

    #[test]
    fn inference_is_deterministic() {
        assert_eq!(<f32 as InstanceData>::FORMAT, TexelFormat::R32Float);
        assert_eq!(<[f32; 4] as InstanceData>::FORMAT, TexelFormat::Rgba32Float);
        assert_eq!(<glam::Vec4 as InstanceData>::FORMAT, TexelFormat::Rgba32Float);
        assert_eq!(<glam::Mat4 as InstanceData>::FORMAT, TexelFormat::Mat4);
        assert_eq!(<u32 as InstanceData>::FORMAT, TexelFormat::R32Uint);
    }

    #[test]
    fn inferred_format_size_matches_rust_size() {
        fn check<T: InstanceData>() {
            assert_eq!(T::FORMAT.element_size() as usize, std::mem::size_of::<T>());
        }
        check::<f32>();
        check::<[f32; 2]>();
        check::<[f32; 4]>();
        check::<i32>();
        check::<u32>();
        check::<[i32; 4]>();
        check::<[u32; 4]>();
        check::<glam::Vec2>();
        check::<glam::Vec4>();
        check::<glam::Mat4>();
    }

    // ── attachment formats ────────────────────────────────────────────────

    #[test]
    fn depth_classification() {
        assert!(AttachmentFormat::Depth24PlusStencil8.is_depth_stencil());
        assert!(AttachmentFormat::Depth32Float.is_depth_stencil());
        assert!(!AttachmentFormat::Rgba32Float.is_depth_stencil());
    }

    #[test]
    fn float_targets_are_unfilterable() {
        assert_eq!(
            AttachmentFormat::Rgba32Float.sample_type(),
            wgpu::TextureSampleType::Float { filterable: false }
        );
        assert_eq!(
            AttachmentFormat::Rgba8Unorm.sample_type(),
            wgpu::TextureSampleType::Float { filterable: true }
        );
    }
}
