//! EvaluationOutcome - result of one stage (or a whole pipeline run).

use std::fmt;

use crate::domain::OfferRecommendation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOutcome {
    pub kind: OutcomeKind,
    /// Stage that produced the outcome.
    pub source: &'static str,
    pub reason: String,
    pub recommendations: Vec<OfferRecommendation>,
}

impl EvaluationOutcome {
    pub fn pass(source: &'static str, reason: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Pass,
            source,
            reason: reason.into(),
            recommendations: Vec::new(),
        }
    }

    pub fn fail(source: &'static str, reason: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Fail,
            source,
            reason: reason.into(),
            recommendations: Vec::new(),
        }
    }

    pub fn with_recommendations(mut self, recommendations: Vec<OfferRecommendation>) -> Self {
        self.recommendations = recommendations;
        self
    }

    pub fn is_passing(&self) -> bool {
        self.kind == OutcomeKind::Pass
    }
}

impl fmt::Display for EvaluationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            OutcomeKind::Pass => "PASS",
            OutcomeKind::Fail => "FAIL",
        };
        write!(f, "{kind}({}): {}", self.source, self.reason)
    }
}
