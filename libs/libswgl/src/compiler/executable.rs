//! Executable memory for JIT-compiled shaders.
//!
//! One fixed region per context. Both stages of the active program are copied
//! in when the program is bound; binding another program overwrites them. The
//! region is mapped read-write, and flipped to read-execute after every install.

use core::ptr;
use crate::error::{GlError, GlResult};
use super::backend_jit::JitFn;

/// Stage entry points are placed at this alignment.
const ENTRY_ALIGN: usize = 16;

pub struct ExecRegion {
    ptr: *mut u8,
    capacity: usize,
    vertex: usize,
    fragment: usize,
    /// Program whose code currently occupies the region.
    installed: Option<u32>,
}

impl ExecRegion {
    /// Map `bytes` (rounded up to whole pages) of memory for code.
    #[cfg(unix)]
    pub fn new(bytes: usize) -> GlResult<Self> {
        use libc::{mmap, MAP_ANON, MAP_PRIVATE, PROT_READ, PROT_WRITE};

        let page_size = page_size();
        let capacity = (bytes.max(1) + page_size - 1) & !(page_size - 1);

        // SAFETY: anonymous private mapping, no file descriptor involved.
        let ptr = unsafe { mmap(ptr::null_mut(), capacity, PROT_READ | PROT_WRITE, MAP_PRIVATE | MAP_ANON, -1, 0) };
        if ptr == libc::MAP_FAILED {
            return Err(GlError::ExecRegion("mmap failed"));
        }
        Ok(Self { ptr: ptr as *mut u8, capacity, vertex: 0, fragment: 0, installed: None })
    }

    #[cfg(not(unix))]
    pub fn new(_bytes: usize) -> GlResult<Self> {
        Err(GlError::ExecRegion("no executable memory on this target"))
    }

    /// Copy both stages of `program` into the region.
    ///
    /// On failure the region holds no program.
    #[cfg(unix)]
    pub fn install(&mut self, program: u32, vertex: &[u8], fragment: &[u8]) -> GlResult<()> {
        use libc::{mprotect, PROT_EXEC, PROT_READ, PROT_WRITE};

        self.installed = None;
        let fragment_at = (vertex.len() + ENTRY_ALIGN - 1) & !(ENTRY_ALIGN - 1);
        if vertex.is_empty() || fragment.is_empty() {
            return Err(GlError::ExecRegion("empty code buffer"));
        }
        if fragment_at + fragment.len() > self.capacity {
            return Err(GlError::ExecRegion("shader code exceeds the execution region"));
        }

        // SAFETY: the region is `capacity` bytes and both copies fit, as checked above.
        unsafe {
            if mprotect(self.ptr as *mut libc::c_void, self.capacity, PROT_READ | PROT_WRITE) != 0 {
                return Err(GlError::ExecRegion("mprotect failed"));
            }
            ptr::copy_nonoverlapping(vertex.as_ptr(), self.ptr, vertex.len());
            ptr::copy_nonoverlapping(fragment.as_ptr(), self.ptr.add(fragment_at), fragment.len());
            if mprotect(self.ptr as *mut libc::c_void, self.capacity, PROT_READ | PROT_EXEC) != 0 {
                return Err(GlError::ExecRegion("mprotect failed"));
            }
        }

        self.vertex = 0;
        self.fragment = fragment_at;
        self.installed = Some(program);
        log::debug!(
            "exec region: installed program {} ({} + {} bytes of {})",
            program,
            vertex.len(),
            fragment.len(),
            self.capacity
        );
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn install(&mut self, _program: u32, _vertex: &[u8], _fragment: &[u8]) -> GlResult<()> {
        Err(GlError::ExecRegion("no executable memory on this target"))
    }

    pub fn installed(&self) -> Option<u32> {
        self.installed
    }

    /// Forget the installed program, forcing the next draw to reinstall.
    pub fn invalidate(&mut self) {
        self.installed = None;
    }

    /// Entry points of the installed vertex and fragment code.
    pub fn entries(&self) -> Option<(JitFn, JitFn)> {
        self.installed?;
        // SAFETY: both offsets point at code written by `install`, which always
        // ends in `ret` and follows the `JitFn` calling convention.
        unsafe {
            let vertex = self.ptr.add(self.vertex);
            let fragment = self.ptr.add(self.fragment);
            Some((core::mem::transmute_copy(&vertex), core::mem::transmute_copy(&fragment)))
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Drop for ExecRegion {
    fn drop(&mut self) {
        #[cfg(unix)]
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.capacity);
        }
    }
}

/// Get the system page size.
#[cfg(unix)]
fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as usize } else { 4096 }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn rounds_to_pages_and_rejects_oversize_code() {
        let mut region = ExecRegion::new(100).expect("mmap");
        assert_eq!(region.capacity() % page_size(), 0);
        let big = vec![0xC3u8; region.capacity()];
        assert!(region.install(1, &big, &[0xC3]).is_err());
        assert_eq!(region.installed(), None);
        assert!(region.entries().is_none());
    }

    #[test]
    fn install_tracks_program() {
        let mut region = ExecRegion::new(4096).expect("mmap");
        region.install(3, &[0xC3], &[0xC3]).expect("install");
        assert_eq!(region.installed(), Some(3));
        assert!(region.entries().is_some());
        region.invalidate();
        assert_eq!(region.installed(), None);
    }
}
