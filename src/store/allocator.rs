//! Identifier Allocator - permanent entity identity assignment
//!
//! - Every identifier is handed out exactly once
//! - Identifiers are strictly increasing, never reused
//! - An identifier counts as issued only once its record is applied, so a
//!   record that failed to persist never consumes one
//! - A durable store re-establishes the high-water mark by replaying its
//!   log, so a restart never re-issues an old identifier
//!
//! The allocator holds no state beyond the highest identifier issued.

use std::fmt;

use crate::model::EntityId;

/// Tracks the highest identifier handed out by one store.
#[derive(Debug, Default)]
pub struct IdentifierAllocator {
    highest: u64,
}

impl IdentifierAllocator {
    /// Create an allocator for an empty store.
    pub fn new() -> Self {
        Self { highest: 0 }
    }

    /// The identifier the next allocation will return.
    ///
    /// Not issued until `mark_allocated` has been called with it.
    pub fn next_id(&self) -> Result<EntityId, AllocatorError> {
        self.highest
            .checked_add(1)
            .map(EntityId::new)
            .ok_or(AllocatorError::Exhausted)
    }

    /// Record that `id` has been issued, live or during replay.
    ///
    /// Must be exactly one past the current high-water mark.
    pub fn mark_allocated(&mut self, id: EntityId) -> Result<(), AllocatorError> {
        let expected = self.next_id()?;
        if id != expected {
            return Err(AllocatorError::OutOfOrder {
                attempted: id.value(),
                expected: expected.value(),
            });
        }
        self.highest = id.value();
        Ok(())
    }

    /// Returns the highest identifier issued so far.
    pub fn highest(&self) -> Option<EntityId> {
        if self.highest == 0 {
            None
        } else {
            Some(EntityId::new(self.highest))
        }
    }

    /// Returns true if `id` has been issued by this allocator.
    pub fn is_allocated(&self, id: EntityId) -> bool {
        id.value() >= 1 && id.value() <= self.highest
    }
}

/// Errors from identifier allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocatorError {
    /// The identifier space is used up.
    Exhausted,
    /// Attempted to mark an identifier out of sequence.
    OutOfOrder { attempted: u64, expected: u64 },
}

impl fmt::Display for AllocatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocatorError::Exhausted => write!(f, "Identifier space exhausted"),
            AllocatorError::OutOfOrder { attempted, expected } => {
                write!(
                    f,
                    "Out of order allocation: attempted {} but expected {}",
                    attempted, expected
                )
            }
        }
    }
}

impl std::error::Error for AllocatorError {}
