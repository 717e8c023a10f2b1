//! Port stage - single-port specialization of the resource stage.

use crate::domain::resource::PORTS;
use crate::domain::{OfferRecommendation, Operation, Range, ResourceId};
use crate::offer::discovery::DiscoveryInfoWriter;
use crate::offer::pod_builder::{BuildTarget, PodInfoBuilder};
use crate::offer::pool::ResourcePool;
use crate::offer::EvaluationOutcome;

use super::ReservationTemplate;

pub(crate) const NAME: &str = "port";

/// `UPPERCASE_SNAKE_CASE` with every non-alphanumeric character replaced by
/// `_`, e.g. `port?test.port` becomes `PORT_TEST_PORT`.
pub fn env_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Environment variable a port is exposed under when none is declared.
pub fn default_env_key(port_name: &str) -> String {
    env_name(&format!("PORT_{port_name}"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortStage {
    pub target: BuildTarget,
    pub port_name: String,
    /// `0` asks for any free port.
    pub port: u64,
    /// Already sanitized environment variable name.
    pub env_key: String,
    pub expected_id: Option<ResourceId>,
    pub writer: DiscoveryInfoWriter,
    pub reservation: ReservationTemplate,
}

impl PortStage {
    pub fn evaluate(&self, pool: &mut ResourcePool, builder: &mut PodInfoBuilder) -> EvaluationOutcome {
        let mut recommendations = Vec::new();

        let resource = match self.expected_id {
            Some(id) => match pool.claim(&id) {
                Some(existing) => existing,
                None => {
                    return EvaluationOutcome::fail(
                        NAME,
                        format!("offer lacks reserved port '{}' with id {id}", self.port_name),
                    );
                }
            },
            None => {
                let found = if self.port == 0 {
                    pool.find_matching_range(PORTS, 1)
                } else {
                    pool.claim_range(PORTS, Range::single(self.port))
                };
                let Some(found) = found else {
                    let wanted = if self.port == 0 {
                        "any port".to_string()
                    } else {
                        format!("port {}", self.port)
                    };
                    return EvaluationOutcome::fail(
                        NAME,
                        format!("offer lacks {wanted} for '{}'", self.port_name),
                    );
                };
                let reserved = found.reserved(self.reservation.with_id(builder.ids().resource_id()));
                recommendations.push(OfferRecommendation::new(
                    pool.offer_id().clone(),
                    pool.agent_id().clone(),
                    Operation::Reserve {
                        resources: vec![reserved.clone()],
                    },
                ));
                reserved
            }
        };

        let Some(port) = resource.first_port() else {
            return EvaluationOutcome::fail(
                NAME,
                format!("reserved resource for '{}' carries no port", self.port_name),
            );
        };
        let Some(owner) = builder.owner_name(&self.target) else {
            return EvaluationOutcome::fail(NAME, format!("unknown target {:?}", self.target));
        };

        builder.add_resource(&self.target, resource);
        builder.set_env(&self.target, &self.env_key, &port.to_string());
        if let Some(discovery) = builder.discovery_mut(&self.target) {
            self.writer.write(discovery, &owner, port);
        }

        EvaluationOutcome::pass(NAME, format!("resolved '{}' to port {port}", self.port_name))
            .with_recommendations(recommendations)
    }
}
