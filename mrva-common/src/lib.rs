//! # MRVA Common Library
//!
//! Shared code for the variant analysis and model editor engine:
//! - Event types and the outbound EventBus
//! - Run and modeling data types shared with the presentation surface
//! - Inbound message protocol
//! - Configuration loading
//! - Logging initialization

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod protocol;

pub use error::{Error, Result};
