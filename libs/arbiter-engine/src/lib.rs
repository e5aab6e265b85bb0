//! Execution, harness generation and grading core of the Arbiter judge.
//!
//! - [`engine`] runs one program per call under a wall-clock timeout
//! - [`harness`] wraps user code with a driver that prints a verdict
//! - [`marker`] is the verdict framing shared by harnesses and the validator
//! - [`validator`] grades a submission example by example

pub mod config;
pub mod engine;
mod error;
pub mod harness;
mod java_source;
pub mod marker;
mod process;
pub mod validator;
pub mod workspace;


pub use config::{CommandTemplate, LanguageConfig, LanguageConfigManager};
pub use engine::{Engine, ExecutionBackend, ExecutionLimits};
pub use error::EngineError;
pub use validator::Validator;
