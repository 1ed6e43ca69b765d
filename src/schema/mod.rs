//! Exercise export schema
//!
//! This module defines the input documents (one per exercise session) and the
//! adapters that read them from JSON exports.

mod raw_event;
mod adapter;

pub use raw_event::*;
pub use adapter::*;
