//! Scalar math for the pipeline and the shader builtins.
//!
//! `core` has no floor or sqrt for `f32`, so these are done by hand. The trig
//! functions are the cheap parabola approximation every backend shares, so
//! interpreted and native shaders produce bit-identical results.

/// Pi as used by the trig approximation.
pub const PI_APPROX: f32 = 3.1415;

/// Floor for values within `i32` range.
#[inline]
pub fn floor(x: f32) -> f32 {
    let t = x as i32 as f32;
    if t > x { t - 1.0 } else { t }
}

/// Round toward zero.
#[inline]
pub fn trunc(x: f32) -> f32 {
    x as i32 as f32
}

#[inline]
pub fn fract(x: f32) -> f32 {
    x - floor(x)
}

/// Parabolic sine: `4(f - f²)` over each half period, sign by half-period parity.
pub fn fast_sin(x: f32) -> f32 {
    let t = x / PI_APPROX;
    let whole = floor(t);
    let f = t - whole;
    let s = 4.0 * (f - f * f);
    if (whole as i32) & 1 != 0 { -s } else { s }
}

pub fn fast_cos(x: f32) -> f32 {
    fast_sin(x + PI_APPROX / 2.0)
}

pub fn fast_tan(x: f32) -> f32 {
    fast_sin(x) / fast_cos(x)
}

/// Square root via SSE `sqrtss`.
#[cfg(target_arch = "x86_64")]
#[inline]
pub fn sqrt(x: f32) -> f32 {
    use core::arch::x86_64::*;
    // SSE is part of the x86_64 baseline.
    unsafe { _mm_cvtss_f32(_mm_sqrt_ss(_mm_set_ss(x))) }
}

/// Square root via Newton iteration.
#[cfg(not(target_arch = "x86_64"))]
pub fn sqrt(x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    let mut y = f32::from_bits((x.to_bits() >> 1) + 0x1FC0_0000);
    for _ in 0..4 {
        y = 0.5 * (y + x / y);
    }
    y
}

#[inline]
pub fn abs(x: f32) -> f32 {
    f32::from_bits(x.to_bits() & 0x7FFF_FFFF)
}

#[inline]
pub fn clamp01(x: f32) -> f32 {
    if x < 0.0 { 0.0 } else if x > 1.0 { 1.0 } else { x }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn floor_handles_negatives() {
        assert_eq!(floor(1.5), 1.0);
        assert_eq!(floor(-1.5), -2.0);
        assert_eq!(floor(-2.0), -2.0);
        assert_eq!(trunc(-1.5), -1.0);
    }

    #[test]
    fn trig_approximation_tracks_sine() {
        for i in -40..40 {
            let x = i as f32 * 0.25;
            assert!((fast_sin(x) - x.sin()).abs() < 0.07, "sin({x})");
            assert!((fast_cos(x) - x.cos()).abs() < 0.07, "cos({x})");
        }
        assert_eq!(fast_sin(0.0), 0.0);
    }

    #[test]
    fn sqrt_matches_std() {
        for x in [0.25f32, 1.0, 2.0, 144.0, 1e6] {
            assert!((sqrt(x) - x.sqrt()).abs() <= x.sqrt() * 1e-6);
        }
    }
}
