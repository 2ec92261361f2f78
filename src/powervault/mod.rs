//! Powervault cloud API module
//!
//! Provides a high-level interface to query and steer a Powervault unit.

pub mod client;
pub mod types;

pub use client::{PowervaultApi, PowervaultClient};
pub use types::*;
