//! Domain model: identifiers, resources, offers, the declarative service
//! model, launched task state and offer operations.

pub mod ids;
pub mod offer;
pub mod pod;
pub mod recommendation;
pub mod resource;
pub mod spec;
pub mod status;
pub mod task;

pub use ids::{AgentId, ConfigId, ExecutorId, OfferId, PersistenceId, ResourceId, TaskId};
pub use offer::Offer;
pub use pod::{PodInstance, PodInstanceRequirement, RecoveryType};
pub use recommendation::{OfferRecommendation, Operation};
pub use resource::{DiskInfo, Range, Reservation, Resource, ResourceValue};
pub use spec::{
    CheckSpec, ExecutorSpec, GoalState, PlacementSpec, PodSpec, PortSpec, ResourceSpec,
    ServiceSpec, SpecValidationError, TaskSpec, VipSpec, VolumeSpec,
};
pub use status::Status;
pub use task::{
    CheckInfo, CommandInfo, DiscoveryInfo, DiscoveryPort, ExecutorInfo, TaskInfo, TaskLabelError,
    TaskState, TaskStatus, Visibility,
};
