//! Resource model: scalars (cpus/mem/disk) and port ranges, optionally
//! reserved under a stable resource id.

use serde::{Deserialize, Serialize};

use super::ids::{PersistenceId, ResourceId};

pub const CPUS: &str = "cpus";
pub const MEM: &str = "mem";
pub const DISK: &str = "disk";
pub const PORTS: &str = "ports";

/// Tolerance for scalar comparisons (cluster managers use fixed-point 0.001).
const SCALAR_EPSILON: f64 = 1e-6;

/// Returns true if `available` is at least `wanted`, within tolerance.
pub fn scalar_covers(available: f64, wanted: f64) -> bool {
    available + SCALAR_EPSILON >= wanted
}

/// Inclusive range of integer values, e.g. ports 5000..=10000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub begin: u64,
    pub end: u64,
}

impl Range {
    pub fn new(begin: u64, end: u64) -> Self {
        Self { begin, end }
    }

    pub fn single(value: u64) -> Self {
        Self::new(value, value)
    }

    pub fn width(&self) -> u64 {
        self.end.saturating_sub(self.begin) + 1
    }

    pub fn contains(&self, other: &Range) -> bool {
        self.begin <= other.begin && other.end <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ResourceValue {
    Scalar(f64),
    Ranges(Vec<Range>),
}

/// Dynamic reservation of a resource for one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub role: String,
    pub principal: String,
    pub resource_id: ResourceId,
}

/// Persistent volume carried by a reserved disk resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskInfo {
    pub persistence_id: PersistenceId,
    pub container_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub value: ResourceValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation: Option<Reservation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<DiskInfo>,
}

impl Resource {
    pub fn scalar(name: impl Into<String>, amount: f64) -> Self {
        Self {
            name: name.into(),
            value: ResourceValue::Scalar(amount),
            reservation: None,
            disk: None,
        }
    }

    pub fn ranges(name: impl Into<String>, ranges: Vec<Range>) -> Self {
        Self {
            name: name.into(),
            value: ResourceValue::Ranges(ranges),
            reservation: None,
            disk: None,
        }
    }

    pub fn port(port: u64) -> Self {
        Self::ranges(PORTS, vec![Range::single(port)])
    }

    pub fn reserved(mut self, reservation: Reservation) -> Self {
        self.reservation = Some(reservation);
        self
    }

    pub fn with_disk(mut self, disk: DiskInfo) -> Self {
        self.disk = Some(disk);
        self
    }

    pub fn resource_id(&self) -> Option<ResourceId> {
        self.reservation.as_ref().map(|r| r.resource_id)
    }

    pub fn is_reserved(&self) -> bool {
        self.reservation.is_some()
    }

    pub fn scalar_value(&self) -> Option<f64> {
        match self.value {
            ResourceValue::Scalar(v) => Some(v),
            ResourceValue::Ranges(_) => None,
        }
    }

    pub fn range_values(&self) -> &[Range] {
        match &self.value {
            ResourceValue::Ranges(r) => r,
            ResourceValue::Scalar(_) => &[],
        }
    }

    /// First port of a ranged resource.
    pub fn first_port(&self) -> Option<u64> {
        self.range_values().first().map(|r| r.begin)
    }

    /// Copy of this resource with the reservation and volume stripped.
    pub fn unreserved(&self) -> Self {
        Self {
            name: self.name.clone(),
            value: self.value.clone(),
            reservation: None,
            disk: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_width_and_containment() {
        let r = Range::new(5000, 10000);
        assert_eq!(r.width(), 5001);
        assert!(r.contains(&Range::single(5000)));
        assert!(r.contains(&Range::new(9000, 10000)));
        assert!(!r.contains(&Range::new(9000, 10001)));
    }

    #[test]
    fn scalar_covers_tolerates_rounding() {
        assert!(scalar_covers(0.3, 0.1 + 0.2));
        assert!(!scalar_covers(0.5, 0.6));
    }

    #[test]
    fn resource_value_is_tagged() {
        let r = Resource::port(8080);
        let v: serde_json::Value = serde_json::to_value(&r).unwrap();
        assert_eq!(v["value"]["type"], "ranges");
        assert_eq!(r.first_port(), Some(8080));
    }
}
