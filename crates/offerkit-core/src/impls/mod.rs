//! Impls - in-process implementations of the ports.
//!
//! # Included
//! - **InMemoryStateStore / InMemoryConfigStore**: stores of record for tests
//!   and single-process runs
//! - **SimulatedCluster**: a ClusterDriver that also generates offers
//!
//! Durable stores and a real cluster manager connection belong in separate
//! crates implementing the same ports.

pub mod memory_store;
pub mod simulated_cluster;

pub use self::memory_store::{InMemoryConfigStore, InMemoryStateStore};
pub use self::simulated_cluster::{AgentSpec, SimulatedCluster};
