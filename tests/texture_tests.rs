//! Texture Sampling Tests
//!
//! Tests for:
//! - Texture units: unbound units, range checks, stale bindings
//! - Nearest / linear / cubic filtering in 1D, 2D and 3D
//! - Address modes: repeat, mirrored repeat, mirror-clamp, clamp-to-border
//! - Array layer selection, view level/layer ranges and swizzles
//! - BC1 and BC4 block sampling
//! - Explicit-LOD sampling: nearest and linear mip filtering, bias, clamps
//! - View and image creation errors

use glam::{Vec3, Vec4};

use myth_raster::errors::RasterError;
use myth_raster::prelude::*;
use myth_raster::renderer::UNBOUND_COLOR;
use myth_raster::resources::{ImageId, ImageType};

const EPSILON: f32 = 1e-5;

fn approx_vec(a: Vec4, b: [f32; 4]) -> bool {
    a.to_array().iter().zip(b).all(|(x, y)| (x - y).abs() < EPSILON)
}

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const WHITE: [u8; 4] = [255; 4];
const BLACK: [u8; 4] = [0, 0, 0, 255];

fn context() -> RenderContext {
    RenderContext::new(RasterSettings::default()).unwrap()
}

/// Creates an image and uploads `levels[level][layer]`.
fn image_with(ctx: &mut RenderContext, desc: ImageDesc, levels: &[&[&[u8]]]) -> ImageId {
    let resources = ctx.resources_mut();
    let id = resources.create_image(desc).unwrap();
    let image = resources.image_mut(id).unwrap();
    for (level, layers) in levels.iter().enumerate() {
        for (layer, bytes) in layers.iter().enumerate() {
            image.upload(level as u32, layer as u32, bytes).unwrap();
        }
    }
    id
}

/// Binds `image` to unit 0.
fn bind(ctx: &mut RenderContext, image: ImageId, view: &ImageViewDesc, sampler: TextureSampler) {
    let view = ctx.resources_mut().create_view(image, view).unwrap();
    let sampler = ctx.resources_mut().create_sampler(sampler);
    ctx.bind_texture(0, view, sampler).unwrap();
}

fn sample(ctx: &RenderContext, u: f32, v: f32, w: f32) -> Vec4 {
    ctx.sample(0, Vec3::new(u, v, w)).unwrap()
}

/// 2×2: red, green / blue, white.
fn quad(ctx: &mut RenderContext) -> ImageId {
    let pixels = [RED, GREEN, BLUE, WHITE].concat();
    image_with(ctx, ImageDesc::d2(Format::Rgba8Unorm, 2, 2), &[&[&pixels]])
}

/// 4×1 R8 ramp: 0, 1/3, 2/3, 1.
fn ramp(ctx: &mut RenderContext) -> ImageId {
    image_with(ctx, ImageDesc::d2(Format::R8Unorm, 4, 1), &[&[&[0, 85, 170, 255]]])
}

// ============================================================================
// Texture Units
// ============================================================================

#[test]
fn unbound_unit_samples_opaque_black() {
    let ctx = context();
    assert_eq!(ctx.sample(0, Vec3::splat(0.5)).unwrap(), UNBOUND_COLOR);
    assert_eq!(UNBOUND_COLOR, Vec4::new(0.0, 0.0, 0.0, 1.0));
    assert_eq!(ctx.sample_lod(15, Vec3::ZERO, 2.0).unwrap(), UNBOUND_COLOR);
}

#[test]
fn unit_index_is_range_checked() {
    let mut ctx = context();
    assert_eq!(
        ctx.sample(16, Vec3::ZERO),
        Err(RasterError::TextureUnitOutOfRange { unit: 16, max: 16 })
    );

    let image = quad(&mut ctx);
    let view = ctx
        .resources_mut()
        .create_view(image, &ImageViewDesc::default())
        .unwrap();
    let sampler = ctx.resources_mut().create_sampler(TextureSampler::nearest());
    assert!(matches!(
        ctx.bind_texture(99, view, sampler),
        Err(RasterError::TextureUnitOutOfRange { unit: 99, .. })
    ));
}

#[test]
fn unbinding_restores_unbound_color() {
    let mut ctx = context();
    let image = quad(&mut ctx);
    bind(&mut ctx, image, &ImageViewDesc::default(), TextureSampler::nearest());
    assert!(approx_vec(sample(&ctx, 0.25, 0.25, 0.0), [1.0, 0.0, 0.0, 1.0]));

    ctx.unbind_texture(0).unwrap();
    assert_eq!(sample(&ctx, 0.25, 0.25, 0.0), UNBOUND_COLOR);
}

#[test]
fn destroyed_image_invalidates_bound_view() {
    let mut ctx = context();
    let image = quad(&mut ctx);
    bind(&mut ctx, image, &ImageViewDesc::default(), TextureSampler::nearest());
    ctx.resources_mut().destroy_image(image);

    assert_eq!(
        ctx.sample(0, Vec3::ZERO),
        Err(RasterError::InvalidHandle("image view"))
    );
}

#[test]
fn binding_requires_live_handles() {
    let mut ctx = context();
    let image = quad(&mut ctx);
    let view = ctx
        .resources_mut()
        .create_view(image, &ImageViewDesc::default())
        .unwrap();
    let sampler = ctx.resources_mut().create_sampler(TextureSampler::default());
    ctx.resources_mut().destroy_sampler(sampler);

    assert_eq!(
        ctx.bind_texture(0, view, sampler),
        Err(RasterError::InvalidHandle("sampler"))
    );
}

// ============================================================================
// Filtering
// ============================================================================

#[test]
fn nearest_fetches_texel_at_texel_centers() {
    let mut ctx = context();
    let image = quad(&mut ctx);
    bind(&mut ctx, image, &ImageViewDesc::default(), TextureSampler::nearest());

    assert!(approx_vec(sample(&ctx, 0.25, 0.25, 0.0), [1.0, 0.0, 0.0, 1.0]));
    assert!(approx_vec(sample(&ctx, 0.75, 0.25, 0.0), [0.0, 1.0, 0.0, 1.0]));
    assert!(approx_vec(sample(&ctx, 0.25, 0.75, 0.0), [0.0, 0.0, 1.0, 1.0]));
    assert!(approx_vec(sample(&ctx, 0.99, 0.99, 0.0), [1.0, 1.0, 1.0, 1.0]));
    assert!(approx_vec(sample(&ctx, 0.01, 0.49, 0.0), [1.0, 0.0, 0.0, 1.0]));
}

#[test]
fn nearest_uses_the_half_texel_shifted_block() {
    let mut ctx = context();
    let image = ramp(&mut ctx);
    bind(&mut ctx, image, &ImageViewDesc::default(), TextureSampler::nearest());

    // floor(u * 4 - 0.5): texel 1 spans u in [0.375, 0.625)
    let r = |u: f32| sample(&ctx, u, 0.5, 0.0).x;
    assert!((r(0.3) - 0.0).abs() < EPSILON);
    assert!((r(0.37) - 0.0).abs() < EPSILON);
    assert!((r(0.4) - 1.0 / 3.0).abs() < EPSILON);
    assert!((r(0.6) - 1.0 / 3.0).abs() < EPSILON);
    assert!((r(0.65) - 2.0 / 3.0).abs() < EPSILON);
}

#[test]
fn linear_interpolates_between_texel_centers() {
    let mut ctx = context();
    let pixels = [BLACK, WHITE].concat();
    let image = image_with(&mut ctx, ImageDesc::d2(Format::Rgba8Unorm, 2, 1), &[&[&pixels]]);
    bind(
        &mut ctx,
        image,
        &ImageViewDesc::default(),
        TextureSampler::nearest().with_filter(FilterMode::Linear),
    );

    assert!(approx_vec(sample(&ctx, 0.25, 0.5, 0.0), [0.0, 0.0, 0.0, 1.0]));
    assert!(approx_vec(sample(&ctx, 0.5, 0.5, 0.0), [0.5, 0.5, 0.5, 1.0]));
    assert!(approx_vec(sample(&ctx, 0.625, 0.5, 0.0), [0.75, 0.75, 0.75, 1.0]));
    // Clamped past the last center.
    assert!(approx_vec(sample(&ctx, 1.0, 0.5, 0.0), [1.0, 1.0, 1.0, 1.0]));
}

#[test]
fn bilinear_weights_both_axes() {
    let mut ctx = context();
    let image = quad(&mut ctx);
    bind(
        &mut ctx,
        image,
        &ImageViewDesc::default(),
        TextureSampler::nearest().with_filter(FilterMode::Linear),
    );

    // Average of all four texels.
    assert!(approx_vec(sample(&ctx, 0.5, 0.5, 0.0), [0.5, 0.5, 0.5, 1.0]));
}

#[test]
fn cubic_preserves_constant_images() {
    let mut ctx = context();
    let pixels = [[102u8, 51, 204, 255]; 16].concat();
    let image = image_with(&mut ctx, ImageDesc::d2(Format::Rgba8Unorm, 4, 4), &[&[&pixels]]);
    bind(
        &mut ctx,
        image,
        &ImageViewDesc::default(),
        TextureSampler::default().with_filter(FilterMode::Cubic),
    );

    for (u, v) in [(0.1, 0.2), (0.5, 0.5), (0.93, 0.07), (-0.4, 1.3)] {
        assert!(
            approx_vec(sample(&ctx, u, v, 0.0), [0.4, 0.2, 0.8, 1.0]),
            "({u}, {v})"
        );
    }
}

#[test]
fn cubic_hits_texel_values_at_centers() {
    let mut ctx = context();
    let image = ramp(&mut ctx);
    bind(
        &mut ctx,
        image,
        &ImageViewDesc::default(),
        TextureSampler::nearest().with_filter(FilterMode::Cubic),
    );

    let r = sample(&ctx, 0.375, 0.5, 0.0).x;
    assert!((r - 1.0 / 3.0).abs() < EPSILON);
}

#[test]
fn one_dimensional_images_filter_one_axis() {
    let mut ctx = context();
    let image = image_with(&mut ctx, ImageDesc::d1(Format::R8Unorm, 2), &[&[&[0, 255]]]);
    bind(
        &mut ctx,
        image,
        &ImageViewDesc::default(),
        TextureSampler::nearest().with_filter(FilterMode::Linear),
    );

    // v and w are ignored.
    assert!((sample(&ctx, 0.5, 7.0, -3.0).x - 0.5).abs() < EPSILON);
}

#[test]
fn trilinear_filters_three_axes() {
    let mut ctx = context();
    let pixels = [[0u8; 4]; 4]
        .into_iter()
        .chain([WHITE; 4])
        .flatten()
        .collect::<Vec<u8>>();
    let image = image_with(&mut ctx, ImageDesc::d3(Format::Rgba8Unorm, 2, 2, 2), &[&[&pixels]]);
    bind(
        &mut ctx,
        image,
        &ImageViewDesc::default(),
        TextureSampler::nearest().with_filter(FilterMode::Linear),
    );

    assert!(approx_vec(sample(&ctx, 0.5, 0.5, 0.5), [0.5; 4]));
    assert!(approx_vec(sample(&ctx, 0.5, 0.5, 0.25), [0.0; 4]));
    assert!(approx_vec(sample(&ctx, 0.1, 0.9, 0.75), [1.0; 4]));
}

// ============================================================================
// Address Modes
// ============================================================================

#[test]
fn repeat_is_periodic() {
    let mut ctx = context();
    let image = quad(&mut ctx);
    bind(&mut ctx, image, &ImageViewDesc::default(), TextureSampler::default());

    for (u, v) in [(0.3, 0.6), (0.05, 0.95), (0.5, 0.5)] {
        let base = sample(&ctx, u, v, 0.0);
        for shift in [-2.0, -1.0, 1.0, 3.0] {
            let shifted = sample(&ctx, u + shift, v - shift, 0.0);
            assert!((base - shifted).abs().max_element() < 1e-4, "({u}, {v}) + {shift}");
        }
    }
}

#[test]
fn repeat_wraps_linear_taps_across_the_edge() {
    let mut ctx = context();
    let pixels = [BLACK, WHITE].concat();
    let image = image_with(&mut ctx, ImageDesc::d2(Format::Rgba8Unorm, 2, 1), &[&[&pixels]]);
    bind(
        &mut ctx,
        image,
        &ImageViewDesc::default(),
        TextureSampler::default(),
    );

    // Halfway between the last texel and the first.
    assert!(approx_vec(sample(&ctx, 0.0, 0.5, 0.0), [0.5, 0.5, 0.5, 1.0]));
}

#[test]
fn huge_and_infinite_coordinates_sample_without_overflow() {
    let mut ctx = context();
    let image = ramp(&mut ctx);
    let modes = [
        AddressMode::Repeat,
        AddressMode::MirroredRepeat,
        AddressMode::MirrorClampToEdge,
        AddressMode::ClampToEdge,
        AddressMode::ClampToBorder,
    ];
    for mode in modes {
        for filter in [FilterMode::Nearest, FilterMode::Linear, FilterMode::Cubic] {
            bind(
                &mut ctx,
                image,
                &ImageViewDesc::default(),
                TextureSampler::nearest().with_address_mode(mode).with_filter(filter),
            );
            for u in [1e10, -1e10, f32::INFINITY, f32::NEG_INFINITY] {
                let texel = ctx.sample(0, Vec3::new(u, 0.5, 0.0)).unwrap();
                assert!(
                    texel.is_finite() && (0.0..=1.0).contains(&texel.x),
                    "{mode:?} {filter:?} u = {u}: {texel}"
                );
            }
        }
    }
}

#[test]
fn repeat_at_huge_coordinate_matches_its_period() {
    let mut ctx = context();
    let image = ramp(&mut ctx);
    bind(
        &mut ctx,
        image,
        &ImageViewDesc::default(),
        TextureSampler::nearest()
            .with_address_mode(AddressMode::Repeat)
            .with_filter(FilterMode::Linear),
    );

    // ±4e10 texels is a whole number of periods and lands on texel 0
    let origin = sample(&ctx, 0.125, 0.5, 0.0);
    assert!((origin.x - 0.0).abs() < EPSILON);
    assert!(approx_vec(sample(&ctx, 1e10, 0.5, 0.0), origin.to_array()));
    assert!(approx_vec(sample(&ctx, -1e10, 0.5, 0.0), origin.to_array()));
}

#[test]
fn mirrored_repeat_reflects_every_period() {
    let mut ctx = context();
    let image = ramp(&mut ctx);
    bind(
        &mut ctx,
        image,
        &ImageViewDesc::default(),
        TextureSampler::nearest().with_address_mode(AddressMode::MirroredRepeat),
    );

    let r = |u: f32| sample(&ctx, u, 0.5, 0.0).x;
    assert!((r(0.125) - 0.0).abs() < EPSILON);
    assert!((r(1.125) - 1.0).abs() < EPSILON);
    assert!((r(1.375) - 2.0 / 3.0).abs() < EPSILON);
    assert!((r(1.875) - 0.0).abs() < EPSILON);
    assert!((r(-0.125) - 0.0).abs() < EPSILON);
    assert!((r(-0.375) - 1.0 / 3.0).abs() < EPSILON);
    assert!((r(2.125) - 0.0).abs() < EPSILON);
}

#[test]
fn mirror_clamp_reflects_once_then_clamps() {
    let mut ctx = context();
    let image = ramp(&mut ctx);
    bind(
        &mut ctx,
        image,
        &ImageViewDesc::default(),
        TextureSampler::nearest().with_address_mode(AddressMode::MirrorClampToEdge),
    );

    let r = |u: f32| sample(&ctx, u, 0.5, 0.0).x;
    assert!((r(-0.375) - 1.0 / 3.0).abs() < EPSILON);
    assert!((r(-0.125) - 0.0).abs() < EPSILON);
    assert!((r(-5.0) - 1.0).abs() < EPSILON);
    assert!((r(5.0) - 1.0).abs() < EPSILON);
}

#[test]
fn clamp_to_border_returns_border_color_exactly() {
    let mut ctx = context();
    let image = quad(&mut ctx);
    let border = [0.25, 0.5, 0.75, 1.0];
    bind(
        &mut ctx,
        image,
        &ImageViewDesc::default(),
        TextureSampler::default()
            .with_address_mode(AddressMode::ClampToBorder)
            .with_border_color(border),
    );

    assert_eq!(sample(&ctx, -1.0, -1.0, 0.0), Vec4::from_array(border));
    assert_eq!(sample(&ctx, 0.5, 2.5, 0.0), Vec4::from_array(border));
}

#[test]
fn clamp_to_border_blends_border_into_edge_taps() {
    let mut ctx = context();
    let pixels = [WHITE; 4].concat();
    let image = image_with(&mut ctx, ImageDesc::d2(Format::Rgba8Unorm, 2, 2), &[&[&pixels]]);
    bind(
        &mut ctx,
        image,
        &ImageViewDesc::default(),
        TextureSampler::default().with_address_mode(AddressMode::ClampToBorder),
    );

    assert!(approx_vec(sample(&ctx, 0.0, 0.5, 0.0), [0.5; 4]));
}

#[test]
fn address_modes_apply_per_axis() {
    let mut ctx = context();
    let image = quad(&mut ctx);
    let sampler = TextureSampler {
        address_mode_u: AddressMode::Repeat,
        address_mode_v: AddressMode::ClampToEdge,
        ..TextureSampler::nearest()
    };
    bind(&mut ctx, image, &ImageViewDesc::default(), sampler);

    // u wraps to the first column, v clamps to the last row.
    assert!(approx_vec(sample(&ctx, 1.25, 7.0, 0.0), [0.0, 0.0, 1.0, 1.0]));
}

// ============================================================================
// Layers, Views and Swizzles
// ============================================================================

#[test]
fn array_layer_comes_from_the_next_coordinate() {
    let mut ctx = context();
    let image = image_with(
        &mut ctx,
        ImageDesc::d2(Format::Rgba8Unorm, 1, 1).with_layers(3),
        &[&[&RED, &GREEN, &BLUE]],
    );
    bind(&mut ctx, image, &ImageViewDesc::default(), TextureSampler::nearest());

    assert!(approx_vec(sample(&ctx, 0.5, 0.5, 0.0), [1.0, 0.0, 0.0, 1.0]));
    assert!(approx_vec(sample(&ctx, 0.5, 0.5, 1.2), [0.0, 1.0, 0.0, 1.0]));
    assert!(approx_vec(sample(&ctx, 0.5, 0.5, 9.0), [0.0, 0.0, 1.0, 1.0]));
    assert!(approx_vec(sample(&ctx, 0.5, 0.5, -4.0), [1.0, 0.0, 0.0, 1.0]));
}

#[test]
fn view_layer_range_offsets_layer_selection() {
    let mut ctx = context();
    let image = image_with(
        &mut ctx,
        ImageDesc::d2(Format::Rgba8Unorm, 1, 1).with_layers(3),
        &[&[&RED, &GREEN, &BLUE]],
    );
    let view = ImageViewDesc {
        base_layer: 1,
        layer_count: Some(1),
        ..Default::default()
    };
    bind(&mut ctx, image, &view, TextureSampler::nearest());

    assert!(approx_vec(sample(&ctx, 0.5, 0.5, 0.0), [0.0, 1.0, 0.0, 1.0]));
    assert!(approx_vec(sample(&ctx, 0.5, 0.5, 2.0), [0.0, 1.0, 0.0, 1.0]));
}

#[test]
fn one_dimensional_array_uses_v_as_layer() {
    let mut ctx = context();
    let image = image_with(
        &mut ctx,
        ImageDesc::d1(Format::Rgba8Unorm, 1).with_layers(2),
        &[&[&RED, &BLUE]],
    );
    bind(&mut ctx, image, &ImageViewDesc::default(), TextureSampler::nearest());

    assert!(approx_vec(sample(&ctx, 0.5, 1.0, 0.0), [0.0, 0.0, 1.0, 1.0]));
    assert!(approx_vec(sample(&ctx, 0.5, 0.0, 1.0), [1.0, 0.0, 0.0, 1.0]));
}

#[test]
fn swizzle_rearranges_channels() {
    let mut ctx = context();
    let image = image_with(
        &mut ctx,
        ImageDesc::d2(Format::Rgba8Unorm, 1, 1),
        &[&[&[255, 0, 0, 128]]],
    );
    let view = ImageViewDesc {
        swizzle: [Swizzle::B, Swizzle::A, Swizzle::R, Swizzle::One],
        ..Default::default()
    };
    bind(&mut ctx, image, &view, TextureSampler::nearest());

    assert!(approx_vec(sample(&ctx, 0.5, 0.5, 0.0), [0.0, 128.0 / 255.0, 1.0, 1.0]));
}

#[test]
fn swizzle_constants_ignore_texel() {
    let mut ctx = context();
    let image = quad(&mut ctx);
    let view = ImageViewDesc {
        swizzle: [Swizzle::Zero, Swizzle::One, Swizzle::Zero, Swizzle::Zero],
        ..Default::default()
    };
    bind(&mut ctx, image, &view, TextureSampler::default());

    assert_eq!(sample(&ctx, 0.3, 0.7, 0.0), Vec4::new(0.0, 1.0, 0.0, 0.0));
}

#[test]
fn missing_channels_decode_to_zero_and_opaque() {
    let mut ctx = context();
    let image = image_with(
        &mut ctx,
        ImageDesc::d2(Format::R32Sfloat, 1, 1),
        &[&[&0.25f32.to_le_bytes()]],
    );
    bind(&mut ctx, image, &ImageViewDesc::default(), TextureSampler::nearest());

    assert_eq!(sample(&ctx, 0.5, 0.5, 0.0), Vec4::new(0.25, 0.0, 0.0, 1.0));
}

#[test]
fn view_may_reinterpret_same_size_formats() {
    let mut ctx = context();
    let image = image_with(
        &mut ctx,
        ImageDesc::d2(Format::Rgba8Unorm, 1, 1),
        &[&[&[10, 20, 30, 40]]],
    );
    let view = ImageViewDesc {
        format: Some(Format::Bgra8Unorm),
        ..Default::default()
    };
    bind(&mut ctx, image, &view, TextureSampler::nearest());

    let texel = sample(&ctx, 0.5, 0.5, 0.0);
    assert!(approx_vec(texel, [30.0 / 255.0, 20.0 / 255.0, 10.0 / 255.0, 40.0 / 255.0]));
}

// ============================================================================
// Block Compression
// ============================================================================

/// Red (c0) and blue (c1) RGB565 endpoints with the given index bits.
fn bc1_block(c0: u16, c1: u16, indices: u32) -> Vec<u8> {
    [c0.to_le_bytes(), c1.to_le_bytes()]
        .concat()
        .into_iter()
        .chain(indices.to_le_bytes())
        .collect()
}

#[test]
fn bc1_four_color_block() {
    let mut ctx = context();
    // Texel (0, 0) uses index 1, every other texel index 0.
    let block = bc1_block(0xf800, 0x001f, 0b01);
    let image = image_with(&mut ctx, ImageDesc::d2(Format::Bc1RgbUnorm, 4, 4), &[&[&block]]);
    bind(&mut ctx, image, &ImageViewDesc::default(), TextureSampler::nearest());

    assert!(approx_vec(sample(&ctx, 0.125, 0.125, 0.0), [0.0, 0.0, 1.0, 1.0]));
    assert!(approx_vec(sample(&ctx, 0.375, 0.125, 0.0), [1.0, 0.0, 0.0, 1.0]));
    assert!(approx_vec(sample(&ctx, 0.875, 0.875, 0.0), [1.0, 0.0, 0.0, 1.0]));
}

#[test]
fn bc1_three_color_block_black_alpha_depends_on_format() {
    let mut ctx = context();
    // c0 <= c1 selects three colors plus black; all indices 3.
    let block = bc1_block(0x001f, 0xf800, u32::MAX);
    let rgb = image_with(&mut ctx, ImageDesc::d2(Format::Bc1RgbUnorm, 4, 4), &[&[&block]]);
    let rgba = image_with(&mut ctx, ImageDesc::d2(Format::Bc1RgbaUnorm, 4, 4), &[&[&block]]);

    bind(&mut ctx, rgb, &ImageViewDesc::default(), TextureSampler::nearest());
    assert!(approx_vec(sample(&ctx, 0.5, 0.5, 0.0), [0.0, 0.0, 0.0, 1.0]));

    bind(&mut ctx, rgba, &ImageViewDesc::default(), TextureSampler::nearest());
    assert!(approx_vec(sample(&ctx, 0.5, 0.5, 0.0), [0.0, 0.0, 0.0, 0.0]));
}

#[test]
fn bc1_linear_filter_spans_texels_within_a_block() {
    let mut ctx = context();
    // Row 0: blue, red, red, red.
    let block = bc1_block(0xf800, 0x001f, 0b01);
    let image = image_with(&mut ctx, ImageDesc::d2(Format::Bc1RgbUnorm, 4, 4), &[&[&block]]);
    bind(
        &mut ctx,
        image,
        &ImageViewDesc::default(),
        TextureSampler::nearest().with_filter(FilterMode::Linear),
    );

    assert!(approx_vec(sample(&ctx, 0.25, 0.125, 0.0), [0.5, 0.0, 0.5, 1.0]));
}

#[test]
fn bc4_decodes_into_red() {
    let mut ctx = context();
    // Endpoint 0 is 1.0 and every index selects it.
    let block = [255u8, 0, 0, 0, 0, 0, 0, 0];
    let image = image_with(&mut ctx, ImageDesc::d2(Format::Bc4Unorm, 4, 4), &[&[&block]]);
    bind(&mut ctx, image, &ImageViewDesc::default(), TextureSampler::nearest());

    assert!(approx_vec(sample(&ctx, 0.6, 0.3, 0.0), [1.0, 0.0, 0.0, 1.0]));
}

// ============================================================================
// Level of Detail
// ============================================================================

/// 4×4 with three levels: red, green, blue.
fn mip_chain(ctx: &mut RenderContext) -> ImageId {
    let l0 = [RED; 16].concat();
    let l1 = [GREEN; 4].concat();
    image_with(
        ctx,
        ImageDesc::d2(Format::Rgba8Unorm, 4, 4).with_levels(3),
        &[&[&l0], &[&l1], &[&BLUE]],
    )
}

#[test]
fn nearest_mip_filter_rounds_lod() {
    let mut ctx = context();
    let image = mip_chain(&mut ctx);
    bind(&mut ctx, image, &ImageViewDesc::default(), TextureSampler::default());

    let at = |lod: f32| ctx.sample_lod(0, Vec3::new(0.4, 0.6, 0.0), lod).unwrap();
    assert!(approx_vec(at(-1.0), [1.0, 0.0, 0.0, 1.0]));
    assert!(approx_vec(at(0.4), [1.0, 0.0, 0.0, 1.0]));
    assert!(approx_vec(at(0.6), [0.0, 1.0, 0.0, 1.0]));
    assert!(approx_vec(at(2.0), [0.0, 0.0, 1.0, 1.0]));
    assert!(approx_vec(at(40.0), [0.0, 0.0, 1.0, 1.0]));
}

#[test]
fn linear_mip_filter_blends_adjacent_levels() {
    let mut ctx = context();
    let image = mip_chain(&mut ctx);
    let sampler = TextureSampler {
        mipmap_filter: MipmapFilterMode::Linear,
        ..TextureSampler::default()
    };
    bind(&mut ctx, image, &ImageViewDesc::default(), sampler);

    let at = |lod: f32| ctx.sample_lod(0, Vec3::new(0.5, 0.5, 0.0), lod).unwrap();
    assert!(approx_vec(at(0.0), [1.0, 0.0, 0.0, 1.0]));
    assert!(approx_vec(at(0.5), [0.5, 0.5, 0.0, 1.0]));
    assert!(approx_vec(at(1.25), [0.0, 0.75, 0.25, 1.0]));
    assert!(approx_vec(at(2.5), [0.0, 0.0, 1.0, 1.0]));
}

#[test]
fn lod_bias_and_clamps_apply_before_level_selection() {
    let mut ctx = context();
    let image = mip_chain(&mut ctx);
    let sampler = TextureSampler {
        lod_bias: 1.0,
        lod_max_clamp: 1.0,
        ..TextureSampler::default()
    };
    bind(&mut ctx, image, &ImageViewDesc::default(), sampler);

    let at = |lod: f32| ctx.sample_lod(0, Vec3::splat(0.5), lod).unwrap();
    assert!(approx_vec(at(0.0), [0.0, 1.0, 0.0, 1.0]));
    assert!(approx_vec(at(5.0), [0.0, 1.0, 0.0, 1.0]));
}

#[test]
fn lod_selects_minification_or_magnification_filter() {
    let mut ctx = context();
    let pixels = [BLACK, WHITE].concat();
    let image = image_with(&mut ctx, ImageDesc::d2(Format::Rgba8Unorm, 2, 1), &[&[&pixels]]);
    let sampler = TextureSampler {
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::Nearest,
        ..TextureSampler::nearest()
    };
    bind(&mut ctx, image, &ImageViewDesc::default(), sampler);

    let coord = Vec3::new(0.5, 0.5, 0.0);
    assert!(approx_vec(ctx.sample_lod(0, coord, 0.0).unwrap(), [0.5, 0.5, 0.5, 1.0]));
    // floor(0.5 * 2 - 0.5) = 0
    assert!(approx_vec(ctx.sample_lod(0, coord, 0.4).unwrap(), [0.0, 0.0, 0.0, 1.0]));
}

#[test]
fn view_base_level_is_sampled_by_default() {
    let mut ctx = context();
    let image = mip_chain(&mut ctx);
    let view = ImageViewDesc {
        base_level: 1,
        ..Default::default()
    };
    bind(&mut ctx, image, &view, TextureSampler::default());

    assert!(approx_vec(sample(&ctx, 0.5, 0.5, 0.0), [0.0, 1.0, 0.0, 1.0]));
    // LOD 1 relative to the view is the image's last level.
    let coarse = ctx.sample_lod(0, Vec3::splat(0.5), 1.0).unwrap();
    assert!(approx_vec(coarse, [0.0, 0.0, 1.0, 1.0]));
}

// ============================================================================
// Creation Errors
// ============================================================================

#[test]
fn view_rejects_different_texel_size() {
    let mut ctx = context();
    let image = quad(&mut ctx);
    let view = ImageViewDesc {
        format: Some(Format::Rg8Unorm),
        ..Default::default()
    };

    assert_eq!(
        ctx.resources_mut().create_view(image, &view),
        Err(RasterError::IncompatibleViewFormat {
            image: Format::Rgba8Unorm,
            view: Format::Rg8Unorm
        })
    );
}

#[test]
fn view_rejects_out_of_range_levels_and_layers() {
    let mut ctx = context();
    let image = mip_chain(&mut ctx);
    let levels = ImageViewDesc {
        base_level: 2,
        level_count: Some(2),
        ..Default::default()
    };
    let layers = ImageViewDesc {
        base_layer: 1,
        ..Default::default()
    };

    assert!(matches!(
        ctx.resources_mut().create_view(image, &levels),
        Err(RasterError::InvalidImage(_))
    ));
    assert!(matches!(
        ctx.resources_mut().create_view(image, &layers),
        Err(RasterError::InvalidImage(_))
    ));
}

#[test]
fn view_ranges_near_u32_max_are_rejected() {
    let mut ctx = context();
    let image = mip_chain(&mut ctx);
    let descs = [
        ImageViewDesc {
            base_level: u32::MAX,
            level_count: Some(2),
            ..Default::default()
        },
        ImageViewDesc {
            base_level: 1,
            level_count: Some(u32::MAX),
            ..Default::default()
        },
        ImageViewDesc {
            base_layer: u32::MAX,
            layer_count: Some(1),
            ..Default::default()
        },
        ImageViewDesc {
            base_layer: u32::MAX,
            ..Default::default()
        },
    ];

    for desc in &descs {
        assert!(
            matches!(
                ctx.resources_mut().create_view(image, desc),
                Err(RasterError::InvalidImage(_))
            ),
            "{desc:?}"
        );
    }
}

#[test]
fn compressed_formats_need_two_dimensional_images() {
    let mut ctx = context();
    assert_eq!(
        ctx.resources_mut()
            .create_image(ImageDesc::d3(Format::Bc1RgbUnorm, 4, 4, 4)),
        Err(RasterError::UnsupportedFetch {
            format: Format::Bc1RgbUnorm,
            image_type: ImageType::D3
        })
    );
    assert!(matches!(
        ctx.resources_mut()
            .create_image(ImageDesc::d1(Format::Bc4Unorm, 4)),
        Err(RasterError::UnsupportedFetch { .. })
    ));
    assert!(
        ctx.resources_mut()
            .create_image(ImageDesc::d2(Format::Bc3Unorm, 8, 4).with_layers(2))
            .is_ok()
    );
}

#[test]
fn upload_size_must_match_level() {
    let mut ctx = context();
    let image = ctx
        .resources_mut()
        .create_image(ImageDesc::d2(Format::Rgba8Unorm, 2, 2))
        .unwrap();
    let image = ctx.resources_mut().image_mut(image).unwrap();

    assert!(matches!(
        image.upload(0, 0, &[0; 15]),
        Err(RasterError::InvalidImage(_))
    ));
    assert!(matches!(
        image.upload(1, 0, &[0; 4]),
        Err(RasterError::InvalidImage(_))
    ));
}
