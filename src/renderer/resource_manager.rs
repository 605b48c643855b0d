//! Resource Manager
//!
//! Owns every image, view, sampler and surface of a render context in
//! `slotmap` arenas. Handles are generational: a handle outliving its
//! resource resolves to [`RasterError::InvalidHandle`] instead of aliasing a
//! newer one.
//!
//! Destroying an image also destroys the views and surfaces that reference
//! it, so a live view or surface always points at a live image.

use slotmap::SlotMap;

use crate::errors::{RasterError, Result};
use crate::resources::{
    Image, ImageDesc, ImageId, ImageView, ImageViewDesc, ImageViewId, SamplerId, Surface,
    SurfaceId, TextureSampler,
};

#[derive(Debug, Default)]
pub struct ResourceManager {
    images: SlotMap<ImageId, Image>,
    views: SlotMap<ImageViewId, ImageView>,
    samplers: SlotMap<SamplerId, TextureSampler>,
    surfaces: SlotMap<SurfaceId, Surface>,
}

impl ResourceManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Images
    // ========================================================================

    pub fn create_image(&mut self, desc: ImageDesc) -> Result<ImageId> {
        let image = Image::new(desc)?;
        let id = self.images.insert(image);
        log::debug!("created image {id:?}: {desc:?}");
        Ok(id)
    }

    /// Destroys `id` together with every view and surface referencing it.
    pub fn destroy_image(&mut self, id: ImageId) -> Option<Image> {
        let image = self.images.remove(id)?;
        let (views, surfaces) = (self.views.len(), self.surfaces.len());
        self.views.retain(|_, view| view.image != id);
        self.surfaces.retain(|_, surface| surface.image != id);
        log::debug!(
            "destroyed image {id:?} ({} views, {} surfaces released)",
            views - self.views.len(),
            surfaces - self.surfaces.len()
        );
        Some(image)
    }

    pub fn image(&self, id: ImageId) -> Result<&Image> {
        self.images.get(id).ok_or(RasterError::InvalidHandle("image"))
    }

    pub fn image_mut(&mut self, id: ImageId) -> Result<&mut Image> {
        self.images.get_mut(id).ok_or(RasterError::InvalidHandle("image"))
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub fn create_view(&mut self, image: ImageId, desc: &ImageViewDesc) -> Result<ImageViewId> {
        let view = ImageView::new(image, self.image(image)?, desc)?;
        Ok(self.views.insert(view))
    }

    pub fn destroy_view(&mut self, id: ImageViewId) -> Option<ImageView> {
        self.views.remove(id)
    }

    pub fn view(&self, id: ImageViewId) -> Result<&ImageView> {
        self.views.get(id).ok_or(RasterError::InvalidHandle("image view"))
    }

    // ========================================================================
    // Samplers
    // ========================================================================

    pub fn create_sampler(&mut self, sampler: TextureSampler) -> SamplerId {
        self.samplers.insert(sampler)
    }

    pub fn destroy_sampler(&mut self, id: SamplerId) -> Option<TextureSampler> {
        self.samplers.remove(id)
    }

    pub fn sampler(&self, id: SamplerId) -> Result<&TextureSampler> {
        self.samplers.get(id).ok_or(RasterError::InvalidHandle("sampler"))
    }

    // ========================================================================
    // Surfaces
    // ========================================================================

    pub fn create_surface(&mut self, image: ImageId, level: u32, layer: u32) -> Result<SurfaceId> {
        let surface = Surface::new(image, self.image(image)?, level, layer)?;
        Ok(self.surfaces.insert(surface))
    }

    pub fn destroy_surface(&mut self, id: SurfaceId) -> Option<Surface> {
        self.surfaces.remove(id)
    }

    pub fn surface(&self, id: SurfaceId) -> Result<&Surface> {
        self.surfaces.get(id).ok_or(RasterError::InvalidHandle("surface"))
    }

    /// Texel bytes of a surface at window position `(x, y)`.
    pub fn surface_texel(&self, id: SurfaceId, x: u32, y: u32) -> Result<Option<&[u8]>> {
        let surface = self.surface(id)?;
        let image = self.image(surface.image)?;
        Ok(surface
            .texel_coord(x, y)
            .and_then(|(tx, ty)| image.texel(surface.level, surface.layer, tx, ty, 0)))
    }

    pub fn surface_texel_mut(&mut self, id: SurfaceId, x: u32, y: u32) -> Result<Option<&mut [u8]>> {
        let surface = *self.surface(id)?;
        let image = self.image_mut(surface.image)?;
        Ok(surface
            .texel_coord(x, y)
            .and_then(|(tx, ty)| image.texel_mut(surface.level, surface.layer, tx, ty, 0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::Format;

    #[test]
    fn test_destroying_an_image_releases_its_views_and_surfaces() {
        let mut resources = ResourceManager::new();
        let image = resources.create_image(ImageDesc::d2(Format::Rgba8Unorm, 4, 4)).unwrap();
        let other = resources.create_image(ImageDesc::d2(Format::Rgba8Unorm, 2, 2)).unwrap();
        let view = resources.create_view(image, &ImageViewDesc::default()).unwrap();
        let kept = resources.create_view(other, &ImageViewDesc::default()).unwrap();
        let surface = resources.create_surface(image, 0, 0).unwrap();

        assert!(resources.destroy_image(image).is_some());
        assert_eq!(resources.view(view), Err(RasterError::InvalidHandle("image view")));
        assert_eq!(resources.surface(surface), Err(RasterError::InvalidHandle("surface")));
        assert!(resources.view(kept).is_ok());
    }

    #[test]
    fn test_stale_handles_do_not_alias() {
        let mut resources = ResourceManager::new();
        let a = resources.create_sampler(TextureSampler::default());
        resources.destroy_sampler(a);
        let b = resources.create_sampler(TextureSampler::nearest());
        assert_ne!(a, b);
        assert!(resources.sampler(a).is_err());
    }
}
