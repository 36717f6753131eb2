// E2E test framework for the Airfone registry

pub mod assertions;
pub mod harness;

pub use harness::{fast_config, wait_until, TestRegistry};
