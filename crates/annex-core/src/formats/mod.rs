//! # Formats Module
//!
//! Binary persistence format for stored values, change records, and
//! attribute definitions.
//!
//! This module only handles format conversion (pure transformations);
//! where the bytes land is the storage layer's business.

mod persistence;

pub use persistence::*;
