//! Vertex attribute fetching from vertex buffers.
//!
//! Reads one vertex's components out of a buffer according to a
//! `vertex_attrib_pointer` descriptor.

use crate::buffer::VertexAttrib;
use crate::types::*;

/// Value of an attribute that has no data behind it.
pub const DEFAULT_ATTRIB: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Fetch attribute `attrib` of vertex `vertex_index` from `buf`.
///
/// Components the descriptor does not supply keep their `(0, 0, 0, 1)`
/// default; components past the end of the buffer read as 0.
pub fn fetch_attribute(buf: &[u8], attrib: &VertexAttrib, vertex_index: usize) -> [f32; 4] {
    if attrib.size == 0 {
        return DEFAULT_ATTRIB;
    }
    let elem_size = attrib.component_size();
    let base = attrib.offset + vertex_index * attrib.effective_stride();

    let mut val = DEFAULT_ATTRIB;
    for (c, out) in val.iter_mut().enumerate().take((attrib.size as usize).min(4)) {
        let off = base + c * elem_size;
        *out = match buf.get(off..off + elem_size) {
            Some(bytes) => decode_component(bytes, attrib.typ, attrib.normalized),
            None => 0.0,
        };
    }
    val
}

fn decode_component(bytes: &[u8], typ: GLenum, normalized: bool) -> f32 {
    let scale = |raw: f32, max: f32| if normalized { raw / max } else { raw };
    match (typ, bytes) {
        (GL_FLOAT, &[a, b, c, d]) => f32::from_le_bytes([a, b, c, d]),
        (GL_UNSIGNED_BYTE, &[a]) => scale(a as f32, 255.0),
        (GL_BYTE, &[a]) => scale(a as i8 as f32, 127.0),
        (GL_UNSIGNED_SHORT, &[a, b]) => scale(u16::from_le_bytes([a, b]) as f32, 65535.0),
        (GL_SHORT, &[a, b]) => scale(i16::from_le_bytes([a, b]) as f32, 32767.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use test_log::test;

    fn attrib(size: u32, typ: GLenum, normalized: bool, stride: u32, offset: usize) -> VertexAttrib {
        VertexAttrib { index: 0, size, typ, normalized, stride, offset }
    }

    fn floats(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn packed_floats_fill_missing_components() {
        let buf = floats(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let a = attrib(3, GL_FLOAT, false, 0, 0);
        assert_eq!(fetch_attribute(&buf, &a, 0), [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(fetch_attribute(&buf, &a, 1), [4.0, 5.0, 6.0, 1.0]);
    }

    #[test]
    fn interleaved_stride_and_offset() {
        // position xy, then uv
        let buf = floats(&[0.0, 0.0, 0.25, 0.75, 1.0, 1.0, 0.5, 0.5]);
        let uv = attrib(2, GL_FLOAT, false, 16, 8);
        assert_eq!(fetch_attribute(&buf, &uv, 1), [0.5, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn integer_types_normalize_on_request() {
        let buf = [255u8, 0, 0x81];
        assert_eq!(fetch_attribute(&buf, &attrib(2, GL_UNSIGNED_BYTE, true, 0, 0), 0)[0], 1.0);
        assert_eq!(fetch_attribute(&buf, &attrib(1, GL_UNSIGNED_BYTE, false, 0, 0), 0)[0], 255.0);
        assert_eq!(fetch_attribute(&buf, &attrib(1, GL_BYTE, true, 0, 2), 0)[0], -1.0);

        let shorts: Vec<u8> = [-32767i16, 100].iter().flat_map(|v| v.to_le_bytes()).collect();
        let s = fetch_attribute(&shorts, &attrib(2, GL_SHORT, true, 0, 0), 0);
        assert_eq!(s[0], -1.0);
        assert!((s[1] - 100.0 / 32767.0).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_reads_zero() {
        let buf = floats(&[1.0, 2.0]);
        assert_eq!(fetch_attribute(&buf, &attrib(2, GL_FLOAT, false, 0, 0), 5), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(fetch_attribute(&buf, &attrib(0, GL_FLOAT, false, 0, 0), 0), DEFAULT_ATTRIB);
    }
}
