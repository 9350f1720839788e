//! Observable events
//!
//! Events are explicit and typed; their string forms are stable.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    ConfigLoaded,

    // Store lifecycle
    StoreOpened,
    StoreReplayComplete,

    // Versioning
    /// New identifier with its first snapshot
    EntityCreated,
    /// Retire-then-append committed
    SnapshotCommitted,
    /// Conditional retire lost the race; the mutation will retry
    CommitConflict,
    /// Conflict retries used up
    RetriesExhausted,
    /// Mutation failed with a non-fatal error
    MutationFailed,
    /// History invariant broken; writers halt (FATAL)
    InvariantViolation,
    /// Mutation refused because the engine halted
    EngineHalted,

    // Verification
    VerifyComplete,
    VerifyFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::StoreOpened => "STORE_OPENED",
            Event::StoreReplayComplete => "STORE_REPLAY_COMPLETE",
            Event::EntityCreated => "ENTITY_CREATED",
            Event::SnapshotCommitted => "SNAPSHOT_COMMITTED",
            Event::CommitConflict => "COMMIT_CONFLICT",
            Event::RetriesExhausted => "RETRIES_EXHAUSTED",
            Event::MutationFailed => "MUTATION_FAILED",
            Event::InvariantViolation => "INVARIANT_VIOLATION",
            Event::EngineHalted => "ENGINE_HALTED",
            Event::VerifyComplete => "VERIFY_COMPLETE",
            Event::VerifyFailed => "VERIFY_FAILED",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::InvariantViolation)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
