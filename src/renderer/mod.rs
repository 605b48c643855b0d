//! Rendering Back End
//!
//! - [`state`]: fixed-function state value types
//! - [`pipeline`]: blend/write unit specialization (codegen, cache)
//! - [`blend`]: interpreted blend/write, equivalent to a compiled unit
//! - [`texture`]: texture units and the sampling engine
//! - [`fragment`]: fragments, fragment programs and outcomes
//! - [`resource_manager`]: image, view, sampler and surface arenas
//! - [`context`]: the render context and the per-fragment pipeline

pub mod blend;
pub mod context;
pub mod fragment;
pub mod pipeline;
pub mod resource_manager;
pub mod state;
pub mod texture;

pub use blend::evaluate_blend;
pub use context::{RenderContext, StencilReference};
pub use fragment::{
    DiscardReason, DrawStats, Fragment, FragmentOutcome, FragmentShader, SolidColor, shader_fn,
};
pub use pipeline::{
    CacheStats, CompiledUnit, Rgba, SharedSpecializationCache, SpecializationCache, UnitHandle,
};
pub use resource_manager::ResourceManager;
pub use state::{
    BlendAttachmentState, BlendEquation, BlendFactor, ColorMask, CompareOp, DepthRange,
    DepthStencilState, PipelineState, RasterizerState, RawBlendAttachment, ScissorRect,
    StencilFaceState, StencilOp,
};
pub use texture::{TextureBinding, TextureUnits, Textures, UNBOUND_COLOR};
