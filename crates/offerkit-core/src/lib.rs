//! offerkit-core
//!
//! Decision engine of a resource-offer scheduler: turns a declarative
//! service spec into deploy and recovery plans, matches plan work against
//! resource offers, and tracks launched tasks through their statuses.
//!
//! # Modules
//! - **domain**: ids, resources, offers, the service spec, tasks and operations
//! - **ports**: store of record, cluster driver, clock, id issuance
//! - **impls**: in-memory stores and a simulated cluster
//! - **offer**: offer evaluation (reservations, volumes, ports, launch) and cleanup
//! - **plan**: plans, phases, steps, strategies, reconciliation
//! - **recovery**: failure detection, recovery plan, launch throttling
//! - **app**: builder, scheduler, event loop, configuration and status

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod offer;
pub mod plan;
pub mod ports;
pub mod recovery;

pub use error::{ErrorKind, SchedulerError, SchedulerResult};
