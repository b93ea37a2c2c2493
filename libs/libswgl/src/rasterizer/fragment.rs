//! Fragment processing: depth test and framebuffer write.

use crate::framebuffer::SwFramebuffer;

/// Depth test against the stored value. A stored depth of exactly 0 means
/// nothing was written there since the last clear, so it always passes.
#[inline]
pub fn depth_test(frag_depth: f32, buffer_depth: f32) -> bool {
    buffer_depth == 0.0 || frag_depth <= buffer_depth
}

/// Store a shaded fragment at buffer index `idx`.
#[inline]
pub fn write(fb: &mut SwFramebuffer, idx: usize, depth: f32, rgba: [f32; 4]) {
    let packed = fb.pack(rgba);
    fb.depth[idx] = depth;
    fb.color[idx] = packed;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColorFormat;
    use test_log::test;

    #[test]
    fn zero_depth_always_passes() {
        assert!(depth_test(5.0, 0.0));
        assert!(depth_test(-1.0, 0.0));
    }

    #[test]
    fn nearer_or_equal_passes() {
        assert!(depth_test(0.25, 0.5));
        assert!(depth_test(0.5, 0.5));
        assert!(!depth_test(0.75, 0.5));
    }

    #[test]
    fn write_packs_for_format() {
        let mut fb = SwFramebuffer::new(2, 1, ColorFormat::Rgb);
        write(&mut fb, 1, 0.3, [1.0, 0.5, 2.0, 0.0]);
        assert_eq!(fb.color[1], 0xFF7F_FFFF);
        assert_eq!(fb.depth[1], 0.3);
        assert_eq!(fb.color[0], 0);
    }
}
