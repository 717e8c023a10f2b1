//! App - the scheduler assembled from ports, offer evaluation, plans and
//! recovery.
//!
//! # Components
//! - **SchedulerConfig**: explicit TOML configuration
//! - **SchedulerBuilder**: wiring and fail-fast startup validation
//! - **DefaultScheduler**: synchronous decision core
//! - **SchedulerLoop**: tokio event loop applying decisions through a `ClusterDriver`
//! - **SchedulerStatus**: serializable status view

pub mod builder;
pub mod config;
pub mod event_loop;
pub mod scheduler;
pub mod status;

pub use self::builder::{BuildError, SchedulerBuilder};
pub use self::config::{ConfigError, SchedulerConfig, load_service_spec};
pub use self::event_loop::{PlanCommand, SchedulerEvent, SchedulerLoop, apply_command};
pub use self::scheduler::{AcceptedOffer, DefaultScheduler, OfferDecisions};
pub use self::status::{SchedulerStatus, TaskCounts};
