//! Texture objects (GL_TEXTURE_2D).
//!
//! Every upload is expanded to RGBA32F regardless of the source layout. The
//! mip chain is explicit: `levels[0]` is the base image and each further level
//! is a 2×2 box-filtered half of the previous one.

use alloc::vec;
use alloc::vec::Vec;
use crate::error::{GlError, GlResult};
use crate::rasterizer::math;
use crate::types::*;

/// Texture units selectable with `active_texture`.
pub const MAX_TEXTURE_UNITS: usize = 8;

/// Mip generation stops before either dimension drops below this.
const MIN_MIP_DIM: u32 = 2;

const UNBOUND_TEXEL: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// One image of a mip chain.
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    /// RGBA texels, row-major.
    pub texels: Vec<[f32; 4]>,
}

impl MipLevel {
    fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        self.texels[(y * self.width + x) as usize]
    }

    fn downsample(&self) -> MipLevel {
        let (width, height) = (self.width / 2, self.height / 2);
        let mut texels = vec![[0.0f32; 4]; (width * height) as usize];
        for y in 0..height {
            for x in 0..width {
                let x1 = (2 * x + 1).min(self.width - 1);
                let y1 = (2 * y + 1).min(self.height - 1);
                let quad = [
                    self.texel(2 * x, 2 * y),
                    self.texel(x1, 2 * y),
                    self.texel(2 * x, y1),
                    self.texel(x1, y1),
                ];
                let out = &mut texels[(y * width + x) as usize];
                for c in 0..4 {
                    out[c] = (quad[0][c] + quad[1][c] + quad[2][c] + quad[3][c]) * 0.25;
                }
            }
        }
        MipLevel { width, height, texels }
    }
}

/// A 2D texture object.
pub struct GlTexture {
    pub levels: Vec<MipLevel>,
    pub wrap_s: GLenum,
    pub wrap_t: GLenum,
    /// Accepted for API compatibility; sampling is always nearest.
    pub min_filter: GLenum,
    pub mag_filter: GLenum,
}

impl GlTexture {
    fn new() -> Self {
        Self {
            levels: Vec::new(),
            wrap_s: GL_REPEAT,
            wrap_t: GL_REPEAT,
            min_filter: GL_LINEAR_MIPMAP_LINEAR,
            mag_filter: GL_LINEAR,
        }
    }

    /// Replace the image with `width × height` pixels of `channels` components.
    ///
    /// Missing channels become 0, missing alpha becomes 1. Byte data is
    /// normalized by 255. Any existing mip chain is discarded.
    pub fn upload(&mut self, width: u32, height: u32, channels: usize, data_type: GLenum, pixels: &[u8]) -> GlResult<()> {
        let bytes_per = match data_type {
            GL_FLOAT => 4,
            GL_UNSIGNED_BYTE => 1,
            other => return Err(GlError::InvalidEnum(other)),
        };
        let count = (width as usize) * (height as usize);
        if pixels.len() < count * channels * bytes_per {
            return Err(GlError::InvalidValue("pixel data shorter than the image"));
        }

        let mut texels = Vec::with_capacity(count);
        for i in 0..count {
            let mut t = UNBOUND_TEXEL;
            for (c, lane) in t.iter_mut().enumerate().take(channels) {
                let off = (i * channels + c) * bytes_per;
                *lane = if bytes_per == 4 {
                    f32::from_le_bytes([pixels[off], pixels[off + 1], pixels[off + 2], pixels[off + 3]])
                } else {
                    pixels[off] as f32 / 255.0
                };
            }
            texels.push(t);
        }
        self.levels.clear();
        self.levels.push(MipLevel { width, height, texels });
        Ok(())
    }

    /// Rebuild the mip chain from the base image.
    pub fn generate_mipmaps(&mut self) {
        self.levels.truncate(1);
        while let Some(last) = self.levels.last() {
            if last.width / 2 < MIN_MIP_DIM || last.height / 2 < MIN_MIP_DIM {
                break;
            }
            let next = last.downsample();
            self.levels.push(next);
        }
    }

    /// Sample with wrap modes and mip blending.
    ///
    /// A level `L > 0` blends level `trunc(L)` toward the next one by
    /// `fract(L)`; both indices are clamped to the chain.
    pub fn sample(&self, u: f32, v: f32, level: f32) -> [f32; 4] {
        if self.levels.is_empty() {
            return UNBOUND_TEXEL;
        }
        let n = self.levels.len();
        if level <= 0.0 || n == 1 {
            return self.fetch_wrapped(0, u, v);
        }
        let lo = (math::trunc(level) as usize).min(n - 1);
        let hi = (lo + 1).min(n - 1);
        let t = math::fract(level);
        let a = self.fetch_wrapped(lo, u, v);
        let b = self.fetch_wrapped(hi, u, v);
        [
            a[0] + (b[0] - a[0]) * t,
            a[1] + (b[1] - a[1]) * t,
            a[2] + (b[2] - a[2]) * t,
            a[3] + (b[3] - a[3]) * t,
        ]
    }

    /// Point-sample the base level with coordinates clamped to the edge.
    ///
    /// This is what compiled shaders see: no wrap modes, no mip chain.
    pub fn fetch_base(&self, u: f32, v: f32) -> [f32; 4] {
        let Some(base) = self.levels.first() else { return UNBOUND_TEXEL };
        if base.texels.is_empty() {
            return UNBOUND_TEXEL;
        }
        let x = ((u * base.width as f32) as i32).clamp(0, base.width as i32 - 1);
        let y = ((v * base.height as f32) as i32).clamp(0, base.height as i32 - 1);
        base.texel(x as u32, y as u32)
    }

    fn fetch_wrapped(&self, level: usize, u: f32, v: f32) -> [f32; 4] {
        let img = &self.levels[level];
        if img.texels.is_empty() {
            return UNBOUND_TEXEL;
        }
        let x = wrap_texel(math::trunc(u * img.width as f32) as i32, img.width, self.wrap_s);
        let y = wrap_texel(math::trunc(v * img.height as f32) as i32, img.height, self.wrap_t);
        img.texel(x, y)
    }
}

/// Map an integer texel coordinate into `[0, size)` per the wrap mode.
fn wrap_texel(i: i32, size: u32, mode: GLenum) -> u32 {
    let n = size as i32;
    let wrapped = match mode {
        GL_CLAMP_TO_EDGE => i,
        GL_MIRRORED_REPEAT => {
            let m = i.rem_euclid(2 * n);
            if m >= n { 2 * n - 1 - m } else { m }
        }
        _ => i.rem_euclid(n),
    };
    wrapped.clamp(0, n - 1) as u32
}

/// Storage for all texture objects.
pub struct TextureStore {
    /// Slot 0 is unused (id 0 = unbound).
    slots: Vec<Option<GlTexture>>,
    next_id: u32,
}

impl TextureStore {
    pub fn new() -> Self {
        Self { slots: Vec::new(), next_id: 1 }
    }

    pub fn gen(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        while self.slots.len() <= id as usize {
            self.slots.push(None);
        }
        self.slots[id as usize] = Some(GlTexture::new());
        id
    }

    pub fn get(&self, id: u32) -> Option<&GlTexture> {
        if id == 0 { return None; }
        self.slots.get(id as usize).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut GlTexture> {
        if id == 0 { return None; }
        self.slots.get_mut(id as usize).and_then(|s| s.as_mut())
    }
}

/// Textures bound to each unit for the duration of one draw.
pub struct SamplerView<'a> {
    pub units: [Option<&'a GlTexture>; MAX_TEXTURE_UNITS],
    /// Mip level for the primitive being shaded.
    pub mip_level: f32,
}

impl<'a> SamplerView<'a> {
    pub fn empty() -> Self {
        Self { units: [None; MAX_TEXTURE_UNITS], mip_level: 0.0 }
    }

    pub fn bind(store: &'a TextureStore, bound: &[u32; MAX_TEXTURE_UNITS]) -> Self {
        let mut view = Self::empty();
        for (unit, &id) in view.units.iter_mut().zip(bound.iter()) {
            *unit = store.get(id);
        }
        view
    }

    fn unit(&self, unit: i32) -> Option<&'a GlTexture> {
        usize::try_from(unit).ok().and_then(|u| self.units.get(u).copied().flatten())
    }

    pub fn sample(&self, unit: i32, u: f32, v: f32) -> [f32; 4] {
        self.unit(unit).map_or(UNBOUND_TEXEL, |t| t.sample(u, v, self.mip_level))
    }

    pub fn fetch_base(&self, unit: i32, u: f32, v: f32) -> [f32; 4] {
        self.unit(unit).map_or(UNBOUND_TEXEL, |t| t.fetch_base(u, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn checker(width: u32, height: u32) -> GlTexture {
        let mut pixels = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let on = (x + y) % 2 == 0;
                pixels.extend_from_slice(if on { &[255, 255, 255] } else { &[0, 0, 0] });
            }
        }
        let mut tex = GlTexture::new();
        tex.upload(width, height, 3, GL_UNSIGNED_BYTE, &pixels).expect("upload");
        tex
    }

    #[test]
    fn upload_expands_channels() {
        let mut tex = GlTexture::new();
        let data: Vec<u8> = [0.25f32, 0.5].iter().flat_map(|f| f.to_le_bytes()).collect();
        tex.upload(1, 1, 2, GL_FLOAT, &data).expect("upload");
        assert_eq!(tex.levels[0].texels[0], [0.25, 0.5, 0.0, 1.0]);
        assert_eq!(tex.upload(2, 2, 4, GL_FLOAT, &data), Err(GlError::InvalidValue("pixel data shorter than the image")));
    }

    #[test]
    fn mip_chain_halves_until_threshold() {
        let mut tex = checker(16, 8);
        tex.generate_mipmaps();
        let dims: Vec<_> = tex.levels.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(dims, [(16, 8), (8, 4), (4, 2)]);
        // A 2x2 box over a checkerboard is uniform grey.
        for t in &tex.levels[1].texels {
            assert!((t[0] - 0.5).abs() < 1e-6);
            assert_eq!(t[3], 1.0);
        }
    }

    #[test]
    fn wrap_modes() {
        assert_eq!(wrap_texel(5, 4, GL_REPEAT), 1);
        assert_eq!(wrap_texel(-1, 4, GL_REPEAT), 3);
        assert_eq!(wrap_texel(5, 4, GL_CLAMP_TO_EDGE), 3);
        assert_eq!(wrap_texel(-3, 4, GL_CLAMP_TO_EDGE), 0);
        assert_eq!(wrap_texel(4, 4, GL_MIRRORED_REPEAT), 3);
        assert_eq!(wrap_texel(-1, 4, GL_MIRRORED_REPEAT), 0);
    }

    #[test]
    fn base_fetch_ignores_wrap_and_mips() {
        let mut tex = checker(4, 4);
        tex.generate_mipmaps();
        // u = 1.25 repeats to texel 1 when wrapping but clamps to 3 for the base fetch.
        assert_eq!(tex.sample(1.25, 0.0, 0.0), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(tex.fetch_base(1.25, 0.0), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(tex.fetch_base(1.25, 0.3), [1.0, 1.0, 1.0, 1.0]);
        let blurred = tex.sample(0.0, 0.0, 1.0);
        assert!((blurred[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn unbound_units_read_opaque_black() {
        let view = SamplerView::empty();
        assert_eq!(view.sample(0, 0.5, 0.5), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(view.fetch_base(9, 0.5, 0.5), [0.0, 0.0, 0.0, 1.0]);
    }
}
