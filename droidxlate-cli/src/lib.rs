//! CLI library for testing purposes

pub mod approval;
pub mod backend;
pub mod check;
pub mod config;
pub mod project;
pub mod report;
pub mod translate;
pub mod validation;

pub use config::{FileConfig, Overrides, Provider, Settings};
pub use droidxlate::RunStatus;
