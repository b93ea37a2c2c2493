//! Near-plane clipping.
//!
//! Triangles are clipped against `z >= -w` only, in clip space before the
//! perspective divide. The other frustum planes are handled by the screen
//! bounding-box clamp in the rasterizer. A triangle produces 0, 1 or 2
//! output triangles.

use alloc::vec;
use alloc::vec::Vec;
use super::ClipVertex;

#[inline]
fn inside(v: &ClipVertex) -> bool {
    v.position[2] >= -v.position[3]
}

/// Clip a triangle against the near plane.
pub fn clip_triangle(tri: &[ClipVertex; 3]) -> Vec<[ClipVertex; 3]> {
    let (ins, outs): (Vec<&ClipVertex>, Vec<&ClipVertex>) = tri.iter().partition(|v| inside(v));

    match (ins.as_slice(), outs.as_slice()) {
        ([_, _, _], _) => vec![tri.clone()],
        ([in0], [out0, out1]) => vec![[
            (*in0).clone(),
            intersect(in0, out0),
            intersect(in0, out1),
        ]],
        ([in0, in1], [out0]) => {
            let a = intersect(in0, out0);
            let b = intersect(in1, out0);
            vec![
                [(*in0).clone(), (*in1).clone(), a.clone()],
                [(*in1).clone(), a, b],
            ]
        }
        _ => Vec::new(),
    }
}

/// Point where edge `a → b` crosses the near plane.
fn intersect(a: &ClipVertex, b: &ClipVertex) -> ClipVertex {
    let (pa, pb) = (&a.position, &b.position);
    let t = (pa[2] + pa[3]) / (pa[3] - pb[3] + pa[2] - pb[2]);
    a.lerp(b, t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use test_log::test;

    fn v(x: f32, z: f32) -> ClipVertex {
        ClipVertex { position: [x, 0.0, z, 1.0], varyings: vec![Value::Float(z)] }
    }

    /// Area in the x/z plane, where every test vertex lives.
    fn area(tri: &[ClipVertex; 3]) -> f32 {
        let [a, b, c] = tri;
        let (ax, az) = (a.position[0], a.position[2]);
        let cross = (b.position[0] - ax) * (c.position[2] - az) - (b.position[2] - az) * (c.position[0] - ax);
        cross.abs() * 0.5
    }

    fn total_area(tris: &[[ClipVertex; 3]]) -> f32 {
        tris.iter().map(area).sum()
    }

    #[test]
    fn inside_triangle_is_unchanged() {
        let tri = [v(0.0, 0.0), v(1.0, 0.5), v(-1.0, 0.5)];
        let out = clip_triangle(&tri);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], tri);
    }

    #[test]
    fn outside_triangle_is_dropped() {
        let tri = [v(0.0, -2.0), v(1.0, -3.0), v(-1.0, -3.0)];
        assert!(clip_triangle(&tri).is_empty());
    }

    #[test]
    fn one_inside_keeps_the_inside_area() {
        let tri = [v(0.0, 1.0), v(2.0, -3.0), v(-2.0, -3.0)];
        let out = clip_triangle(&tri);
        assert_eq!(out.len(), 1);
        assert!((total_area(&out) - 2.0).abs() < 1e-4);
        // Varyings follow the same parameter as the position.
        for vert in &out[0] {
            assert_eq!(vert.varyings[0], Value::Float(vert.position[2]));
            assert!(vert.position[2] >= -1.0 - 1e-5);
        }
    }

    #[test]
    fn two_inside_split_into_two_triangles() {
        let tri = [v(0.0, -3.0), v(2.0, 1.0), v(-2.0, 1.0)];
        let out = clip_triangle(&tri);
        assert_eq!(out.len(), 2);
        assert!((total_area(&out) - 6.0).abs() < 1e-4);
        assert_eq!(out[0][0].position, tri[1].position);
        assert_eq!(out[0][1].position, tri[2].position);
        assert_eq!(out[1][0].position, tri[2].position);
    }
}
