//! Domain identifiers (strongly-typed IDs).
//!
//! Scheduler-issued identifiers are ULIDs wrapped in a generic `Id<T>`; the
//! marker type `T` only exists at compile time, so a `ResourceId` can never be
//! passed where a `TaskId` is expected.
//!
//! Identifiers issued by the cluster manager (offers, agents) and executor ids
//! (which embed the executor name) are plain string newtypes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// Marker trait for each ID type.
///
/// Provides the prefix used by `Display` and expected by `FromStr`.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic ULID-backed ID.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {expected_prefix}id: {value}")]
pub struct ParseIdError {
    pub expected_prefix: &'static str,
    pub value: String,
}

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseIdError {
            expected_prefix: T::prefix(),
            value: s.to_string(),
        };
        let raw = s.strip_prefix(T::prefix()).ok_or_else(err)?;
        let ulid = Ulid::from_string(raw).map_err(|_| err())?;
        Ok(Self::from_ulid(ulid))
    }
}

// ========================================
// Markers
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {}

impl IdMarker for Resource {
    fn prefix() -> &'static str {
        "res-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn prefix() -> &'static str {
        "task-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Config {}

impl IdMarker for Config {
    fn prefix() -> &'static str {
        "config-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Persistence {}

impl IdMarker for Persistence {
    fn prefix() -> &'static str {
        "vol-"
    }
}

/// Reservation id carried by a reserved resource. Stable across offers.
pub type ResourceId = Id<Resource>;

/// Identifier of one launched task attempt.
pub type TaskId = Id<Task>;

/// Version of a stored `ServiceSpec`.
pub type ConfigId = Id<Config>;

/// Identifier of a persistent volume.
pub type PersistenceId = Id<Persistence>;

// ========================================
// Cluster-manager issued identifiers
// ========================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Offer identifier assigned by the cluster manager.
    OfferId
);
string_id!(
    /// Worker node identifier assigned by the cluster manager.
    AgentId
);
string_id!(
    /// Executor identifier, `"{executor name}__{ulid}"` when generated here.
    ExecutorId
);

impl ExecutorId {
    /// Derives a fresh executor id from the executor's name.
    pub fn from_name(name: &str) -> Self {
        Self(format!("{name}__{}", Ulid::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let ulid = Ulid::new();
        let resource = ResourceId::from_ulid(ulid);
        let task = TaskId::from_ulid(ulid);

        assert_eq!(resource.as_ulid(), task.as_ulid());
        assert!(resource.to_string().starts_with("res-"));
        assert!(task.to_string().starts_with("task-"));
        // let _: ResourceId = task; // <- does not compile
    }

    #[test]
    fn display_parses_back() {
        let id = ConfigId::from_ulid(Ulid::new());
        let parsed: ConfigId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_rejects_wrong_prefix() {
        let id = TaskId::from_ulid(Ulid::new());
        let err = id.to_string().parse::<ConfigId>().unwrap_err();
        assert_eq!(err.expected_prefix, "config-");
    }

    #[test]
    fn executor_id_embeds_name() {
        let id = ExecutorId::from_name("hello-executor");
        assert!(id.as_str().starts_with("hello-executor__"));
        assert_ne!(id, ExecutorId::from_name("hello-executor"));
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<ResourceId>(), size_of::<Ulid>());
    }
}
