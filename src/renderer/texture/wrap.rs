//! Integer coordinate wrapping.

use crate::resources::AddressMode;

/// Maps texel coordinate `v` onto `[0, max)`.
///
/// Returns `None` (border) for `ClampToBorder` coordinates outside the
/// image; every other mode always yields an index. `v` is 64-bit so taps
/// around a saturated block never overflow.
#[inline]
#[must_use]
pub fn wrap(mode: AddressMode, max: i32, v: i64) -> Option<i32> {
    debug_assert!(max > 0);
    let max = i64::from(max);
    let index = match mode {
        AddressMode::ClampToEdge => v.clamp(0, max - 1),
        AddressMode::ClampToBorder => (0..max).contains(&v).then_some(v)?,
        AddressMode::Repeat => v.rem_euclid(max),
        AddressMode::MirroredRepeat => {
            let t = v.rem_euclid(2 * max);
            if t < max { t } else { 2 * max - 1 - t }
        }
        AddressMode::MirrorClampToEdge => {
            let mirrored = if v >= 0 { v } else { -(1 + v) };
            mirrored.min(max - 1)
        }
    };
    // always in [0, max)
    Some(index as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_to_edge() {
        assert_eq!(wrap(AddressMode::ClampToEdge, 4, -3), Some(0));
        assert_eq!(wrap(AddressMode::ClampToEdge, 4, 2), Some(2));
        assert_eq!(wrap(AddressMode::ClampToEdge, 4, 9), Some(3));
    }

    #[test]
    fn test_clamp_to_border() {
        assert_eq!(wrap(AddressMode::ClampToBorder, 4, -1), None);
        assert_eq!(wrap(AddressMode::ClampToBorder, 4, 0), Some(0));
        assert_eq!(wrap(AddressMode::ClampToBorder, 4, 3), Some(3));
        assert_eq!(wrap(AddressMode::ClampToBorder, 4, 4), None);
    }

    #[test]
    fn test_repeat_is_periodic() {
        for v in -20..20 {
            for k in -3..=3 {
                assert_eq!(
                    wrap(AddressMode::Repeat, 5, v),
                    wrap(AddressMode::Repeat, 5, v + k * 5)
                );
            }
        }
        assert_eq!(wrap(AddressMode::Repeat, 5, -1), Some(4));
    }

    #[test]
    fn test_mirrored_repeat() {
        let seq: Vec<_> = (-4..8)
            .map(|v| wrap(AddressMode::MirroredRepeat, 3, v).unwrap())
            .collect();
        assert_eq!(seq, [2, 2, 1, 0, 0, 1, 2, 2, 1, 0, 0, 1]);
    }

    #[test]
    fn test_extreme_coordinates() {
        for mode in [
            AddressMode::ClampToEdge,
            AddressMode::Repeat,
            AddressMode::MirroredRepeat,
            AddressMode::MirrorClampToEdge,
        ] {
            for v in [i64::MIN, i64::MIN + 1, i64::MAX - 1, i64::MAX] {
                let w = wrap(mode, 4, v).unwrap();
                assert!((0..4).contains(&w), "{mode:?} {v} -> {w}");
            }
        }
        assert_eq!(wrap(AddressMode::ClampToBorder, 4, i64::MAX), None);
        assert_eq!(wrap(AddressMode::ClampToBorder, 4, i64::MIN), None);
    }

    #[test]
    fn test_mirror_clamp_to_edge() {
        assert_eq!(wrap(AddressMode::MirrorClampToEdge, 4, -1), Some(0));
        assert_eq!(wrap(AddressMode::MirrorClampToEdge, 4, -3), Some(2));
        assert_eq!(wrap(AddressMode::MirrorClampToEdge, 4, -10), Some(3));
        assert_eq!(wrap(AddressMode::MirrorClampToEdge, 4, 7), Some(3));
    }
}
