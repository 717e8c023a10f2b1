//! IdGenerator port - abstraction over id generation.
//!
//! # Implementations
//! - **UlidGenerator**: ULID based, timestamp taken from a `Clock`

use std::sync::Arc;

use ulid::Ulid;

use crate::domain::ids::{ConfigId, PersistenceId, ResourceId, TaskId};
use crate::ports::Clock;

/// IdGenerator issues the scheduler-side identifiers.
///
/// # Thread Safety
/// - requires `Send + Sync`; shared as `Arc<dyn IdGenerator>`
pub trait IdGenerator: Send + Sync {
    /// Reservation id for a newly reserved resource.
    fn resource_id(&self) -> ResourceId;

    fn task_id(&self) -> TaskId;

    fn config_id(&self) -> ConfigId;

    fn persistence_id(&self) -> PersistenceId;
}

/// UlidGenerator builds ULIDs from the clock's time plus random bits.
///
/// With a `FixedClock` the timestamp part is deterministic.
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn next(&self) -> Ulid {
        let timestamp_ms = self.clock.now_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl IdGenerator for UlidGenerator {
    fn resource_id(&self) -> ResourceId {
        ResourceId::from(self.next())
    }

    fn task_id(&self) -> TaskId {
        TaskId::from(self.next())
    }

    fn config_id(&self) -> ConfigId {
        ConfigId::from(self.next())
    }

    fn persistence_id(&self) -> PersistenceId {
        PersistenceId::from(self.next())
    }
}
