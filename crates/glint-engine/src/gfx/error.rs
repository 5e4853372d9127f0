use std::path::PathBuf;

/// Errors produced by the gfx resource layer.
///
/// Every fallible public operation returns one of these; nothing in the
/// library decides fatality on its own. The one deliberately *non*-error case
/// is drawing an unregistered geometry, which logs and no-ops so a missing
/// batch cannot take down an interactive session.
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("unknown geometry '{0}'")]
    UnknownGeometry(String),

    #[error("unknown mesh store '{0}'")]
    UnknownMeshStore(String),

    #[error("unknown shader program '{0}'")]
    UnknownShader(String),

    #[error("stale handle: {0}")]
    StaleHandle(&'static str),

    #[error("element size {0} is not a multiple of 4 bytes")]
    UnalignedElement(u64),

    #[error("vertex data length {len} is not a multiple of the store stride {stride}")]
    RaggedVertexData { len: usize, stride: u32 },

    #[error("unsupported vertex attribute width {0} (expected 1-4 float components)")]
    UnsupportedAttribute(u32),

    #[error("framebuffer already has a depth/stencil attachment")]
    DoubleDepthAttachment,

    #[error("framebuffer has no attachments")]
    EmptyAttachmentList,

    #[error("shader source not found: {0}")]
    ShaderNotFound(PathBuf),

    #[error("failed to read shader source {path}: {source}")]
    ShaderRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("texture buffer format mismatch: bound as {bound}, created as {created}")]
    TexelFormatMismatch { bound: &'static str, created: &'static str },

    #[error("buffer readback failed: {0}")]
    Readback(String),

    #[error("program '{name}' binding {binding} references a missing resource")]
    MissingBinding { name: String, binding: u32 },
}
