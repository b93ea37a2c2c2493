//! Error type for the GL entry points.
//!
//! Only handle misuse surfaces as an error. Everything the pipeline can shrug
//! off (type mismatches, re-uploads, draws without bindings) stays a logged
//! no-op so a frame is never aborted halfway.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlError {
    #[error("no shader object with id {0}")]
    InvalidShader(u32),
    #[error("no program object with id {0}")]
    InvalidProgram(u32),
    #[error("no buffer object with id {0}")]
    InvalidBuffer(u32),
    #[error("no vertex array object with id {0}")]
    InvalidVertexArray(u32),
    #[error("no texture object with id {0}")]
    InvalidTexture(u32),
    #[error("uniform location {0:#x} does not name a uniform")]
    InvalidUniformLocation(i32),
    #[error("unsupported enum value {0:#x}")]
    InvalidEnum(u32),
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
    #[error("execution region: {0}")]
    ExecRegion(&'static str),
}

pub type GlResult<T> = Result<T, GlError>;
