//! Context creation parameters.

/// Pixel layout of the color attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFormat {
    /// Alpha byte is always written as 0xFF.
    Rgb,
    /// Alpha byte carries the fragment's clamped alpha.
    Rgba,
}

/// How shader stages are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderBackend {
    /// Walk the AST per invocation. Full texture wrap and mip support.
    Interpreter,
    /// Run the lowered micro-op stream in a portable loop.
    MicroOp,
    /// Run the lowered micro-ops as native x86_64 code.
    Jit,
}

#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub width: u32,
    pub height: u32,
    pub color_format: ColorFormat,
    pub backend: ShaderBackend,
    /// Size of the single executable region the active program is installed into.
    pub exec_region_bytes: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            color_format: ColorFormat::Rgba,
            backend: ShaderBackend::Jit,
            exec_region_bytes: 256 * 1024,
        }
    }
}

impl ContextConfig {
    pub fn with_size(width: u32, height: u32) -> Self {
        Self { width, height, ..Self::default() }
    }

    pub fn backend(mut self, backend: ShaderBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn color_format(mut self, format: ColorFormat) -> Self {
        self.color_format = format;
        self
    }
}
