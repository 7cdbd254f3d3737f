//! Core protocol types, config, scaling, and errors for Slateview.

pub mod config;
pub mod error;
pub mod protocol;
pub mod scaling;

pub use error::{Result, SlateError};
