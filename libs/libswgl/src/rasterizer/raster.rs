//! Triangle rasterization using edge functions.
//!
//! Scans the pixels of the triangle's screen bounding box, clamped to the
//! viewport and the framebuffer, and tests each pixel center against the
//! three edges. Depth comes from the plain screen-space weights; varyings use
//! perspective-corrected weights. The mip level is picked once per triangle.

use crate::compiler::ast::VarId;
use super::math::{abs, floor, sqrt};
use super::{fragment, interpolate_value, ClipVertex, DrawCall};

/// Screen distance at which a triangle samples mip level 1.
const MIP_REFERENCE_DISTANCE: f32 = 80.0;

/// Twice the signed area of `(a, b, p)`.
#[inline(always)]
fn edge_fn(a: &[f32; 3], b: &[f32; 3], p: [f32; 2]) -> f32 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

/// Barycentric weights of `p` in screen triangle `s`, or `None` if the
/// triangle is degenerate. Weights sum to 1 and are all `>= 0` inside.
pub fn barycentric(s: &[[f32; 3]; 3], p: [f32; 2]) -> Option<[f32; 3]> {
    let area = edge_fn(&s[0], &s[1], [s[2][0], s[2][1]]);
    if area == 0.0 {
        return None;
    }
    Some([
        edge_fn(&s[1], &s[2], p) / area,
        edge_fn(&s[2], &s[0], p) / area,
        edge_fn(&s[0], &s[1], p) / area,
    ])
}

/// Per-triangle mip level: the reference distance over the distance of the
/// third vertex from the line through the first two. 0 when that is 0.
pub fn mip_level(s: &[[f32; 3]; 3]) -> f32 {
    let (dx, dy) = (s[1][0] - s[0][0], s[1][1] - s[0][1]);
    let len = sqrt(dx * dx + dy * dy);
    if len == 0.0 {
        return 0.0;
    }
    let dist = abs(edge_fn(&s[0], &s[1], [s[2][0], s[2][1]])) / len;
    if dist == 0.0 { 0.0 } else { MIP_REFERENCE_DISTANCE / dist }
}

/// Rasterize one clipped triangle and shade every covered pixel.
pub fn rasterize_triangle(call: &mut DrawCall, tri: &[ClipVertex; 3], color: VarId) {
    let clip_w = [tri[0].position[3], tri[1].position[3], tri[2].position[3]];
    if clip_w.iter().any(|&w| abs(w) < 1e-6) {
        return;
    }
    let s = [
        call.to_screen(tri[0].position),
        call.to_screen(tri[1].position),
        call.to_screen(tri[2].position),
    ];

    // ── Bounding box ─────────────────────────────────────────────────────
    let [vx, vy, vw, vh] = call.viewport;
    let (fb_w, fb_h) = (call.fb.width as i32, call.fb.height as i32);
    let min_x = (floor(min3(s[0][0], s[1][0], s[2][0])) as i32).max(vx).max(0);
    let max_x = (floor(max3(s[0][0], s[1][0], s[2][0])) as i32 + 1).min(vx + vw).min(fb_w);
    let min_y = (floor(min3(s[0][1], s[1][1], s[2][1])) as i32).max(vy).max(0);
    let max_y = (floor(max3(s[0][1], s[1][1], s[2][1])) as i32 + 1).min(vy + vh).min(fb_h);
    if min_x >= max_x || min_y >= max_y {
        return;
    }

    call.samplers.mip_level = mip_level(&s);

    for y in min_y..max_y {
        for x in min_x..max_x {
            let p = [x as f32 + 0.5, y as f32 + 0.5];
            let Some(w) = barycentric(&s, p) else { return };
            if w[0] < 0.0 || w[1] < 0.0 || w[2] < 0.0 {
                continue;
            }

            let z = s[0][2] * w[0] + s[1][2] * w[1] + s[2][2] * w[2];
            let Some(idx) = call.fb.index(x, y) else { continue };
            if !fragment::depth_test(z, call.fb.depth[idx]) {
                continue;
            }

            // Perspective correction.
            let mut c = [w[0] / clip_w[0], w[1] / clip_w[1], w[2] / clip_w[2]];
            let sum = c[0] + c[1] + c[2];
            if sum != 0.0 {
                for ci in c.iter_mut() {
                    *ci /= sum;
                }
            }

            let inputs = (0..tri[0].varyings.len()).map(|i| {
                interpolate_value([&tri[0].varyings[i], &tri[1].varyings[i], &tri[2].varyings[i]], c)
            });
            let rgba = call.shade_fragment(inputs, color);
            fragment::write(call.fb, idx, z, rgba);
        }
    }
}

#[inline(always)]
fn min3(a: f32, b: f32, c: f32) -> f32 {
    a.min(b).min(c)
}

#[inline(always)]
fn max3(a: f32, b: f32, c: f32) -> f32 {
    a.max(b).max(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    const TRI: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [8.0, 0.0, 0.0], [0.0, 8.0, 0.0]];

    #[test]
    fn weights_inside_are_non_negative_and_sum_to_one() {
        for &p in &[[1.5f32, 1.5], [0.5, 6.5], [3.5, 3.5], [6.5, 0.5]] {
            let w = barycentric(&TRI, p).expect("non-degenerate");
            assert!(w.iter().all(|&x| x >= 0.0), "{p:?} -> {w:?}");
            assert!((w.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn weights_are_winding_independent() {
        let flipped = [TRI[0], TRI[2], TRI[1]];
        let w = barycentric(&flipped, [2.5, 1.5]).expect("non-degenerate");
        assert!(w.iter().all(|&x| x >= 0.0));
        let outside = barycentric(&TRI, [7.5, 7.5]).expect("non-degenerate");
        assert!(outside.iter().any(|&x| x < 0.0));
    }

    #[test]
    fn weights_recover_vertices() {
        let w = barycentric(&TRI, [8.0, 0.0]).expect("non-degenerate");
        assert_eq!(w, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn degenerate_triangle_has_no_weights() {
        let line = [[0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [2.0, 2.0, 0.0]];
        assert!(barycentric(&line, [0.5, 0.5]).is_none());
        assert_eq!(mip_level(&line), 0.0);
    }

    #[test]
    fn mip_level_scales_inversely_with_height() {
        assert_eq!(mip_level(&TRI), 10.0);
        let tall = [[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [3.0, 160.0, 0.0]];
        assert_eq!(mip_level(&tall), 0.5);
    }
}
