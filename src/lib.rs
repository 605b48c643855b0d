//! Myth Raster
//!
//! Fragment back end of a software rasterizer:
//!
//! - per-state specialized blend/write units generated from a small IR and
//!   kept in a bounded LRU cache keyed by an FNV fingerprint
//! - the per-fragment pipeline (depth range, scissor, stencil, depth,
//!   shading, blending, stencil/depth writes)
//! - a texture sampling engine with five address modes, nearest/linear/cubic
//!   filtering, BC1–BC5 decoding and swizzles
//!
//! ```rust,ignore
//! use myth_raster::prelude::*;
//!
//! let mut ctx = RenderContext::new(RasterSettings::default())?;
//! let image = ctx.resources_mut().create_image(ImageDesc::d2(Format::Rgba8Unorm, 64, 64))?;
//! let surface = ctx.resources_mut().create_surface(image, 0, 0)?;
//! ctx.set_color_target(Some(surface))?;
//! ctx.blend = BlendAttachmentState::ALPHA_BLENDING;
//! ctx.blend_enabled = true;
//! ctx.draw(&fragments, &mut SolidColor([1.0, 0.0, 0.0, 0.5]))?;
//! ```

pub mod errors;
pub mod renderer;
pub mod resources;
pub mod settings;
pub mod utils;

pub use errors::{RasterError, Result};
pub use renderer::{
    BlendAttachmentState, BlendEquation, BlendFactor, ColorMask, CompareOp, Fragment,
    FragmentOutcome, FragmentShader, PipelineState, RenderContext, SharedSpecializationCache,
    SpecializationCache,
};
pub use resources::{Format, Image, ImageDesc, ImageType, TextureSampler};
pub use settings::RasterSettings;

/// Commonly used types.
pub mod prelude {
    pub use crate::errors::{RasterError, Result};
    pub use crate::renderer::{
        BlendAttachmentState, BlendEquation, BlendFactor, ColorMask, CompareOp, DepthRange,
        DepthStencilState, DiscardReason, DrawStats, Fragment, FragmentOutcome, FragmentShader,
        PipelineState, RasterizerState, RenderContext, Rgba, ScissorRect, SolidColor,
        StencilFaceState, StencilOp, StencilReference, Textures, shader_fn,
    };
    pub use crate::resources::{
        AddressMode, FilterMode, Format, ImageDesc, ImageViewDesc, MipmapFilterMode, Swizzle,
        TextureSampler,
    };
    pub use crate::settings::RasterSettings;
}
