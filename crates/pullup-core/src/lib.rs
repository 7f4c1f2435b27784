//! # pullup-core
//!
//! Core primitives shared by every pullup component.
//!
//! This crate provides:
//!
//! - **Entities**: Case-insensitive company identifiers and ordered sets of them
//! - **Records**: Product data points and record sets with snapshot merging
//! - **Identifiers**: Strongly-typed invocation IDs
//! - **Observability**: Logging initialisation and span constructors
//! - **Error Types**: Shared error definitions and result types
//!
//! ## Example
//!
//! ```rust
//! use pullup_core::prelude::*;
//!
//! # fn main() -> pullup_core::error::Result<()> {
//! let entities = EntitySet::parse(["Apple", "samsung", "APPLE"])?;
//! assert_eq!(entities.len(), 2);
//! assert_eq!(entities.get("apple").map(Entity::name), Some("Apple"));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod entity;
pub mod error;
pub mod id;
pub mod observability;
pub mod record;

pub use entity::{Entity, EntityKey, EntitySet};
pub use id::InvocationId;
pub use record::{Record, RecordSet};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::entity::{Entity, EntityKey, EntitySet};
    pub use crate::error::{Error, Result};
    pub use crate::id::InvocationId;
    pub use crate::record::{Record, RecordSet};
}
