//! Ports - boundaries to the outside world.
//!
//! Each trait hides an external collaborator (store of record, cluster
//! manager, time, id issuance) so the decision core can be driven from tests
//! with in-memory implementations.

pub mod clock;
pub mod cluster_driver;
pub mod id_generator;
pub mod state_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::cluster_driver::{ClusterDriver, DriverError, ReconcileRequest};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::state_store::{
    ConfigStore, StateError, StateResult, StateStore, fetch_json_property, store_json_property,
};
