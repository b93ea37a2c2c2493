//! libswgl — software OpenGL-style renderer for hosts without a GPU.
//!
//! Compiles a small GLSL subset and rasterizes points and triangles into an
//! in-memory framebuffer that the embedder blits wherever it likes.
//!
//! # Architecture
//! - State machine in [`state::GlContext`], one per renderer
//! - GLSL compiler: [`compiler`] (lexer → parser → AST → evaluator, or
//!   micro-ops → portable interpreter / x86_64 JIT)
//! - Software rasterizer: [`rasterizer`] (vertex → clip → raster → fragment)
//! - Framebuffer: [`framebuffer::SwFramebuffer`] (packed RGBA color + f32 depth)
//!
//! # Example
//! ```no_run
//! use libswgl::{ContextConfig, GlContext, ShaderBackend};
//! use libswgl::types::*;
//!
//! let mut gl = GlContext::new(ContextConfig::with_size(320, 240).backend(ShaderBackend::Interpreter));
//! gl.clear_color(0.0, 0.0, 1.0, 1.0);
//! gl.clear(GL_COLOR_BUFFER_BIT | GL_DEPTH_BUFFER_BIT);
//! let pixels: &[u32] = gl.color_buffer();
//! # let _ = pixels;
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod types;
pub mod error;
pub mod config;
pub mod value;
pub mod arena;
pub mod state;
pub mod buffer;
pub mod texture;
pub mod shader;
pub mod framebuffer;
pub mod compiler;
pub mod rasterizer;

pub use config::{ColorFormat, ContextConfig, ShaderBackend};
pub use error::{GlError, GlResult};
pub use state::GlContext;
