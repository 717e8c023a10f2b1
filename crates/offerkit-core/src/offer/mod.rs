//! Offer evaluation: matching one offer against one pod requirement.
//!
//! - **pool**: the offer's resources, consumed as stages claim them
//! - **stage**: resource, port, volume, executor, placement and launch stages
//! - **pipeline**: fail-fast ordered run of the stages
//! - **requirement**: requirement + stored tasks -> stage list
//! - **evaluator**: tries a requirement against an offer batch
//! - **cleaner**: releases reservations nothing refers to

pub mod cleaner;
pub mod discovery;
pub mod evaluator;
pub mod outcome;
pub mod pipeline;
pub mod placement;
pub mod pod_builder;
pub mod pool;
pub mod requirement;
pub mod stage;

pub use cleaner::ResourceCleaner;
pub use discovery::{DiscoveryError, DiscoveryInfoWriter, VipLabel};
pub use evaluator::{EvaluationResult, OfferEvaluator};
pub use outcome::{EvaluationOutcome, OutcomeKind};
pub use pipeline::{OfferEvaluationPipeline, PipelineResult};
pub use placement::PlacementRule;
pub use pod_builder::{BuildTarget, PodInfoBuilder};
pub use pool::ResourcePool;
pub use requirement::RequirementError;
pub use stage::{EvaluationStage, ReservationTemplate};
