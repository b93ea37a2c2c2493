//! Vertex buffer and vertex array objects.
//!
//! Buffers are opaque byte blobs that can be filled exactly once. A vertex
//! array holds the attribute descriptors set by `vertex_attrib_pointer` and the
//! vertex buffer bound while it was current.

use alloc::vec::Vec;
use crate::types::*;

/// A GL buffer object holding raw byte data.
pub struct GlBuffer {
    pub data: Vec<u8>,
    pub usage: GLenum,
    /// Set by the first `buffer_data`; later uploads are ignored.
    pub sized: bool,
}

/// Storage for all buffer objects.
pub struct BufferStore {
    /// Slot 0 is unused (id 0 = unbound). Slots 1..N hold buffer objects.
    slots: Vec<Option<GlBuffer>>,
    next_id: u32,
}

impl BufferStore {
    pub fn new() -> Self {
        Self { slots: Vec::new(), next_id: 1 }
    }

    pub fn gen(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        while self.slots.len() <= id as usize {
            self.slots.push(None);
        }
        self.slots[id as usize] = Some(GlBuffer { data: Vec::new(), usage: GL_STATIC_DRAW, sized: false });
        id
    }

    pub fn get(&self, id: u32) -> Option<&GlBuffer> {
        if id == 0 { return None; }
        self.slots.get(id as usize).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut GlBuffer> {
        if id == 0 { return None; }
        self.slots.get_mut(id as usize).and_then(|s| s.as_mut())
    }
}

impl GlBuffer {
    /// Fill the buffer. Returns `false` if it already holds data.
    pub fn upload(&mut self, data: &[u8], usage: GLenum) -> bool {
        if self.sized {
            return false;
        }
        self.data.extend_from_slice(data);
        self.usage = usage;
        self.sized = true;
        true
    }
}

/// Per-attribute pointer configuration set by `vertex_attrib_pointer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttrib {
    /// `layout(location = N)` this feeds.
    pub index: u32,
    /// Number of components (1, 2, 3, or 4).
    pub size: u32,
    /// Data type (GL_FLOAT, GL_BYTE, etc.).
    pub typ: GLenum,
    /// Whether integer values are normalized.
    pub normalized: bool,
    /// Byte offset between consecutive vertices; 0 means tightly packed.
    pub stride: u32,
    /// Byte offset of the first component in the bound buffer.
    pub offset: usize,
}

impl VertexAttrib {
    /// Bytes per component.
    pub fn component_size(&self) -> usize {
        match self.typ {
            GL_BYTE | GL_UNSIGNED_BYTE => 1,
            GL_SHORT | GL_UNSIGNED_SHORT => 2,
            _ => 4,
        }
    }

    /// Distance between consecutive vertices in bytes.
    pub fn effective_stride(&self) -> usize {
        if self.stride > 0 {
            self.stride as usize
        } else {
            self.size as usize * self.component_size()
        }
    }
}

/// A vertex array object.
#[derive(Default)]
pub struct VertexArray {
    pub attribs: Vec<VertexAttrib>,
    /// Vertex buffer bound while this array was current, 0 if none.
    pub buffer: u32,
}

impl VertexArray {
    /// Add a descriptor, replacing any existing one for the same index.
    pub fn set_attrib(&mut self, attrib: VertexAttrib) {
        match self.attribs.iter_mut().find(|a| a.index == attrib.index) {
            Some(existing) => *existing = attrib,
            None => self.attribs.push(attrib),
        }
    }
}

/// Storage for all vertex array objects.
pub struct VertexArrayStore {
    slots: Vec<Option<VertexArray>>,
    next_id: u32,
}

impl VertexArrayStore {
    pub fn new() -> Self {
        Self { slots: Vec::new(), next_id: 1 }
    }

    pub fn gen(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        while self.slots.len() <= id as usize {
            self.slots.push(None);
        }
        self.slots[id as usize] = Some(VertexArray::default());
        id
    }

    pub fn get(&self, id: u32) -> Option<&VertexArray> {
        if id == 0 { return None; }
        self.slots.get(id as usize).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut VertexArray> {
        if id == 0 { return None; }
        self.slots.get_mut(id as usize).and_then(|s| s.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn buffers_are_write_once() {
        let mut store = BufferStore::new();
        let id = store.gen();
        assert_eq!(id, 1);
        let buf = store.get_mut(id).expect("buffer");
        assert!(buf.upload(&[1, 2, 3], GL_STATIC_DRAW));
        assert!(!buf.upload(&[9, 9], GL_DYNAMIC_DRAW));
        assert_eq!(store.get(id).expect("buffer").data, [1, 2, 3]);
        assert!(store.get(0).is_none());
        assert!(store.get(7).is_none());
    }

    #[test]
    fn attrib_descriptors_replace_by_index() {
        let mut vao = VertexArray::default();
        let attrib = VertexAttrib { index: 0, size: 3, typ: GL_FLOAT, normalized: false, stride: 0, offset: 0 };
        vao.set_attrib(attrib);
        vao.set_attrib(VertexAttrib { index: 1, size: 2, ..attrib });
        vao.set_attrib(VertexAttrib { size: 4, ..attrib });
        assert_eq!(vao.attribs.len(), 2);
        assert_eq!(vao.attribs[0].size, 4);
        assert_eq!(vao.attribs[0].effective_stride(), 16);
        assert_eq!(VertexAttrib { typ: GL_SHORT, stride: 0, ..attrib }.effective_stride(), 6);
    }
}
