//! GL type aliases and enum constants.
//!
//! Values match the standard OpenGL headers so application code can pass the
//! familiar names straight through.

// ── Type Aliases ────────────────────────────────────────────────────────────

pub type GLenum = u32;
pub type GLbitfield = u32;

// ── Clear Bits ──────────────────────────────────────────────────────────────

pub const GL_COLOR_BUFFER_BIT: GLbitfield = 0x00004000;
pub const GL_DEPTH_BUFFER_BIT: GLbitfield = 0x00000100;

// ── Primitive Types ─────────────────────────────────────────────────────────

pub const GL_POINTS: GLenum = 0x0000;
pub const GL_LINES: GLenum = 0x0001;
pub const GL_TRIANGLES: GLenum = 0x0004;

// ── Buffer Targets ──────────────────────────────────────────────────────────

pub const GL_ARRAY_BUFFER: GLenum = 0x8892;

// ── Buffer Usage ────────────────────────────────────────────────────────────

pub const GL_STREAM_DRAW: GLenum = 0x88E0;
pub const GL_STATIC_DRAW: GLenum = 0x88E4;
pub const GL_DYNAMIC_DRAW: GLenum = 0x88E8;

// ── Data Types ──────────────────────────────────────────────────────────────

pub const GL_BYTE: GLenum = 0x1400;
pub const GL_UNSIGNED_BYTE: GLenum = 0x1401;
pub const GL_SHORT: GLenum = 0x1402;
pub const GL_UNSIGNED_SHORT: GLenum = 0x1403;
pub const GL_FLOAT: GLenum = 0x1406;

// ── Texture Targets ─────────────────────────────────────────────────────────

pub const GL_TEXTURE_2D: GLenum = 0x0DE1;

// ── Texture Parameters ──────────────────────────────────────────────────────

pub const GL_TEXTURE_MAG_FILTER: GLenum = 0x2800;
pub const GL_TEXTURE_MIN_FILTER: GLenum = 0x2801;
pub const GL_TEXTURE_WRAP_S: GLenum = 0x2802;
pub const GL_TEXTURE_WRAP_T: GLenum = 0x2803;

// ── Texture Filter Values ───────────────────────────────────────────────────

pub const GL_NEAREST: GLenum = 0x2600;
pub const GL_LINEAR: GLenum = 0x2601;
pub const GL_LINEAR_MIPMAP_LINEAR: GLenum = 0x2703;

// ── Texture Wrap Values ─────────────────────────────────────────────────────

pub const GL_REPEAT: GLenum = 0x2901;
pub const GL_CLAMP_TO_EDGE: GLenum = 0x812F;
pub const GL_MIRRORED_REPEAT: GLenum = 0x8370;

// ── Pixel Formats ───────────────────────────────────────────────────────────

pub const GL_RED: GLenum = 0x1903;
pub const GL_RGB: GLenum = 0x1907;
pub const GL_RGBA: GLenum = 0x1908;
pub const GL_RG: GLenum = 0x8227;

// ── Texture Units ───────────────────────────────────────────────────────────

pub const GL_TEXTURE0: GLenum = 0x84C0;

// ── Shader Types ────────────────────────────────────────────────────────────

pub const GL_FRAGMENT_SHADER: GLenum = 0x8B30;
pub const GL_VERTEX_SHADER: GLenum = 0x8B31;
