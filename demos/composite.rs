//! Composites a textured, stencil-masked disc over a checkerboard and writes
//! the result as a binary PPM.
//!
//! ```text
//! cargo run --example composite -- out.ppm
//! ```

use anyhow::Context;
use glam::{Vec3, Vec4};

use myth_raster::prelude::*;

const SIZE: u32 = 64;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let path = std::env::args().nth(1).unwrap_or_else(|| "composite.ppm".into());

    let mut ctx = RenderContext::new(RasterSettings::default())?;

    // === 1. Render targets ===
    let color_image = ctx
        .resources_mut()
        .create_image(ImageDesc::d2(Format::Rgba8Unorm, SIZE, SIZE))?;
    let ds_image = ctx
        .resources_mut()
        .create_image(ImageDesc::d2(Format::D24UnormS8Uint, SIZE, SIZE))?;
    let color = ctx.resources_mut().create_surface(color_image, 0, 0)?;
    let depth_stencil = ctx.resources_mut().create_surface(ds_image, 0, 0)?;
    ctx.set_color_target(Some(color))?;
    ctx.set_depth_target(Some(depth_stencil))?;
    ctx.set_stencil_target(Some(depth_stencil))?;
    ctx.clear_color([0.1, 0.1, 0.1, 1.0])?;
    ctx.clear_depth(1.0)?;
    ctx.clear_stencil(0)?;

    // === 2. A BC1 texture: red/blue checker inside each 4×4 block ===
    let block: Vec<u8> = [0xf800u16.to_le_bytes(), 0x001fu16.to_le_bytes()]
        .concat()
        .into_iter()
        .chain(0x4411_4411u32.to_le_bytes())
        .collect();
    let texture = ctx
        .resources_mut()
        .create_image(ImageDesc::d2(Format::Bc1RgbUnorm, 4, 4))?;
    ctx.resources_mut().image_mut(texture)?.upload(0, 0, &block)?;
    let view = ctx
        .resources_mut()
        .create_view(texture, &ImageViewDesc::default())?;
    let sampler = ctx.resources_mut().create_sampler(
        TextureSampler::default()
            .with_address_mode(AddressMode::MirroredRepeat)
            .with_filter(FilterMode::Cubic),
    );
    ctx.bind_texture(0, view, sampler)?;

    let pixels: Vec<Fragment> = (0..SIZE as i32)
        .flat_map(|y| (0..SIZE as i32).map(move |x| (x, y)))
        .map(|(x, y)| {
            let uv = Vec4::new(x as f32 / SIZE as f32, y as f32 / SIZE as f32, 0.0, 0.0);
            Fragment::new(x, y, 0.5).with_varying(uv)
        })
        .collect();

    // === 3. Checkerboard background ===
    let mut checker = shader_fn(|f: &Fragment, _: &Textures<'_>| {
        let on = ((f.x / 8) + (f.y / 8)) % 2 == 0;
        Ok(Some(if on { [0.9; 4] } else { [0.3, 0.3, 0.3, 1.0] }))
    });
    let stats = ctx.draw(&pixels, &mut checker)?;
    log::info!("background: {stats:?}");

    // === 4. Stencil mask: mark a disc ===
    ctx.depth_stencil.stencil_test = true;
    ctx.depth_stencil.depth_write = false;
    ctx.depth_stencil.front.pass_op = StencilOp::Replace;
    ctx.stencil_reference.front = 1;
    ctx.blend.color_mask = ColorMask::empty();
    let center = SIZE as f32 / 2.0;
    let mut disc = shader_fn(|f: &Fragment, _: &Textures<'_>| {
        let d = Vec3::new(f.x as f32 - center, f.y as f32 - center, 0.0).length();
        Ok((d < center * 0.8).then_some([0.0; 4]))
    });
    let stats = ctx.draw(&pixels, &mut disc)?;
    log::info!("stencil mask: {stats:?}");

    // === 5. Textured layer, blended where the stencil is set ===
    ctx.depth_stencil.front = StencilFaceState {
        compare: CompareOp::Equal,
        ..Default::default()
    };
    ctx.blend = BlendAttachmentState::ALPHA_BLENDING;
    ctx.blend_enabled = true;
    let mut textured = shader_fn(|f: &Fragment, textures: &Textures<'_>| {
        let uv = f.varying(0).truncate() * 3.0;
        let mut texel = textures.sample(0, uv)?;
        texel.w = 0.75;
        Ok(Some(texel.to_array()))
    });
    let stats = ctx.draw(&pixels, &mut textured)?;
    log::info!("textured layer: {stats:?}");
    log::info!("blend units: {:?}", ctx.cache().stats());

    // === 6. Write out ===
    let mut ppm = format!("P6\n{SIZE} {SIZE}\n255\n").into_bytes();
    for y in (0..SIZE).rev() {
        for x in 0..SIZE {
            let texel = ctx
                .read_color(x, y)?
                .context("pixel outside the color target")?;
            ppm.extend(texel.truncate().to_array().map(|c| (c * 255.0).round() as u8));
        }
    }
    std::fs::write(&path, ppm).with_context(|| format!("writing {path}"))?;
    println!("wrote {path}");
    Ok(())
}
