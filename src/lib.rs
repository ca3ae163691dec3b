//! Library exports for nestkey, shared between the binary and tests.

pub mod backend;
pub mod config;
pub mod flows;
pub mod models;
pub mod resolver;
pub mod startup;
pub mod state;
pub mod store;
pub mod utils;
