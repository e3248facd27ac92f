//! Core engine: per-file orchestration and candidate validation.

pub mod pipeline;
pub mod validator;

pub use pipeline::{FileReport, Pipeline, RunReport};
pub use validator::Validator;
