//! Resource definitions
//!
//! Value types for everything the context creates and destroys explicitly:
//! - Format: texel layouts, decode and masked encode
//! - Bc: BC1–BC5 block decoding
//! - Image: owned level/layer storage
//! - ImageView / Surface: non-owning views for sampling and rendering
//! - TextureSampler: address, filter and LOD parameters

pub mod bc;
pub mod format;
pub mod image;
pub mod sampler;
pub mod view;

pub use format::{BlockKind, Format, Layout};
pub use image::{Image, ImageDesc, ImageType};
pub use sampler::{AddressMode, FilterMode, MipmapFilterMode, TextureSampler};
pub use view::{ImageView, ImageViewDesc, Surface, Swizzle};

slotmap::new_key_type! {
    pub struct ImageId;
    pub struct ImageViewId;
    pub struct SamplerId;
    pub struct SurfaceId;
}
