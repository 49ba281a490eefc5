//! Common test utilities for drive-to-release end-to-end tests

#[allow(dead_code)]
pub mod config;
#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod mocks;

pub use config::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use mocks::*;
