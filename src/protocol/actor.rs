//! Actor-identity collaborator
//!
//! Every snapshot records who created it. Mutating calls resolve the actor
//! before touching the store; no actor means no write.

use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::errors::{VersionError, VersionResult};

/// Environment variable consulted by `EnvActor`.
pub const ACTOR_ENV_VAR: &str = "CHRONOSET_ACTOR";

pub trait ActorProvider: Send + Sync {
    fn current_actor(&self) -> VersionResult<String>;
}

/// Always the same actor.
#[derive(Debug, Clone)]
pub struct FixedActor {
    name: String,
}

impl FixedActor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ActorProvider for FixedActor {
    fn current_actor(&self) -> VersionResult<String> {
        non_blank(&self.name)
    }
}

/// Cycles through a fixed roster, one name per call.
///
/// A reproducible stand-in for "whoever happens to be logged in".
#[derive(Debug)]
pub struct RosterActor {
    names: Vec<String>,
    next: AtomicUsize,
}

impl RosterActor {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            next: AtomicUsize::new(0),
        }
    }
}

impl ActorProvider for RosterActor {
    fn current_actor(&self) -> VersionResult<String> {
        if self.names.is_empty() {
            return Err(VersionError::ActorUnavailable("actor roster is empty".to_string()));
        }
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.names.len();
        non_blank(&self.names[slot])
    }
}

/// Reads the actor from `CHRONOSET_ACTOR` on every call.
#[derive(Debug, Default, Clone)]
pub struct EnvActor;

impl ActorProvider for EnvActor {
    fn current_actor(&self) -> VersionResult<String> {
        match env::var(ACTOR_ENV_VAR) {
            Ok(name) => non_blank(&name),
            Err(_) => Err(VersionError::ActorUnavailable(format!(
                "{} is not set",
                ACTOR_ENV_VAR
            ))),
        }
    }
}

fn non_blank(name: &str) -> VersionResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(VersionError::ActorUnavailable("actor name is blank".to_string()))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_actor() {
        assert_eq!(FixedActor::new("Desmond").current_actor().unwrap(), "Desmond");
    }

    #[test]
    fn test_blank_actor_is_unavailable() {
        let err = FixedActor::new("  ").current_actor().unwrap_err();
        assert!(matches!(err, VersionError::ActorUnavailable(_)));
    }

    #[test]
    fn test_roster_rotates_deterministically() {
        let roster = RosterActor::new(["Billy", "Sally", "Mark"]);
        let seen: Vec<_> = (0..4).map(|_| roster.current_actor().unwrap()).collect();
        assert_eq!(seen, vec!["Billy", "Sally", "Mark", "Billy"]);
    }

    #[test]
    fn test_empty_roster_is_unavailable() {
        let roster = RosterActor::new(Vec::<String>::new());
        assert!(roster.current_actor().is_err());
    }
}
