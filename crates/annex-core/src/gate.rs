//! # Access Gate
//!
//! Pure capability check between an attribute's requirement and the
//! capability set a caller explicitly presents.
//!
//! Policy: deny by default; allow only on exact membership. There is no
//! capability hierarchy: a broader administrative capability never
//! satisfies a narrower one.

use crate::primitives::{Capability, CapabilitySet};

/// Whether a caller holding `held` may touch an attribute gated by
/// `required`.
///
/// Pure function, no side effects, no state beyond the two arguments.
#[must_use]
pub fn check(required: &Capability, held: &CapabilitySet) -> bool {
    held.holds(required)
}

// =============================================================================
// TESTS
// =============================================================================
