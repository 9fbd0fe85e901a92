//! Core type definitions for the ACT chain
//!
//! All types follow these naming conventions:
//! - snake_case for field names
//! - *_id suffix for identifiers
//! - *_hash suffix for digests

mod block;
mod common;
mod content;
mod entry;

pub use block::*;
pub use common::*;
pub use content::*;
pub use entry::*;

pub(crate) use common::short_id;
