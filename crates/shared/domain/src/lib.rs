//! # Domain Models
//!
//! This crate contains pure domain types with minimal dependencies (`serde`, `bitflags`).
//! Keep it lean: no I/O, networking, or heavy logic—just data and simple helpers.

pub mod arguments;
pub mod config;
pub mod constants;
pub mod permissions;

pub use arguments::{ArgumentValue, Arguments, FromArgument};
pub use permissions::Permissions;
