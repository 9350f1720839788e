//! Versioning Protocol
//!
//! This module provides:
//! - `VersioningEngine` - create / edit / attach / delete / restore
//! - `EngineContext` - clock, actor, retry and tombstone policy
//! - `Clock`, `ActorProvider` - injected collaborators
//! - `VersionError` - errors surfaced to callers

mod actor;
mod clock;
mod engine;
mod errors;
mod retry;

pub use actor::{ActorProvider, EnvActor, FixedActor, RosterActor, ACTOR_ENV_VAR};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EngineContext, Revision, VersioningEngine};
pub use errors::{VersionError, VersionResult};
pub use retry::{RetryPolicy, TombstonePolicy};
