pub mod risk;

use serde::Serialize;

/// Score above which an assessment is presented as likely manipulated.
pub const HIGH_RISK_THRESHOLD: u8 = 50;

const MAX_SCORE: u32 = 100;

/// Heuristic rules in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RiskRule {
    EditingSoftware,
    CameraSignature,
    MissingMetadata,
    LosslessFormat,
    SquareAspect,
    GenerativeResolution,
}

impl RiskRule {
    pub fn contribution(&self) -> u32 {
        match self {
            RiskRule::EditingSoftware => 30,
            RiskRule::CameraSignature => 0,
            RiskRule::MissingMetadata => 40,
            RiskRule::LosslessFormat => 10,
            RiskRule::SquareAspect => 30,
            RiskRule::GenerativeResolution => 20,
        }
    }

    pub fn needs_dimensions(&self) -> bool {
        matches!(self, RiskRule::SquareAspect | RiskRule::GenerativeResolution)
    }
}

/// Accumulated 0-100 risk score and the reasons behind it, in rule order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    score: u8,
    reasons: Vec<String>,
    rules: Vec<RiskRule>,
    dimensions_resolved: bool,
    #[serde(skip)]
    total: u32,
}

impl RiskAssessment {
    pub(crate) fn new() -> Self {
        Self {
            score: 0,
            reasons: Vec::new(),
            rules: Vec::new(),
            dimensions_resolved: false,
            total: 0,
        }
    }

    /// Adds a rule's contribution once; a rule that already fired is ignored.
    pub(crate) fn add(&mut self, rule: RiskRule, reason: impl Into<String>) {
        if self.rules.contains(&rule) {
            return;
        }

        self.total += rule.contribution();
        self.score = self.total.min(MAX_SCORE) as u8;
        self.rules.push(rule);
        self.reasons.push(reason.into());
    }

    pub(crate) fn mark_dimensions_resolved(&mut self) {
        self.dimensions_resolved = true;
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    pub fn rules(&self) -> &[RiskRule] {
        &self.rules
    }

    /// Sum of contributions before clamping.
    pub fn raw_total(&self) -> u32 {
        self.total
    }

    /// `false` while the dimension-dependent rules are still deferred.
    pub fn is_final(&self) -> bool {
        self.dimensions_resolved
    }

    pub fn is_high_risk(&self) -> bool {
        self.score > HIGH_RISK_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_clamps_at_100() {
        let mut assessment = RiskAssessment::new();
        assessment.add(RiskRule::MissingMetadata, "a");
        assessment.add(RiskRule::SquareAspect, "b");
        assessment.add(RiskRule::GenerativeResolution, "c");
        assessment.add(RiskRule::EditingSoftware, "d");

        assert_eq!(assessment.raw_total(), 120);
        assert_eq!(assessment.score(), 100);
        assert_eq!(assessment.reasons().len(), 4);
    }

    #[test]
    fn test_rule_fires_once() {
        let mut assessment = RiskAssessment::new();
        assessment.add(RiskRule::LosslessFormat, "png");
        assessment.add(RiskRule::LosslessFormat, "png again");

        assert_eq!(assessment.score(), 10);
        assert_eq!(assessment.reasons(), ["png".to_string()]);
    }

    #[test]
    fn test_zero_contribution_still_records_reason() {
        let mut assessment = RiskAssessment::new();
        assessment.add(RiskRule::CameraSignature, "verified");

        assert_eq!(assessment.score(), 0);
        assert_eq!(assessment.rules(), [RiskRule::CameraSignature]);
        assert!(!assessment.is_high_risk());
    }

    #[test]
    fn test_high_risk_threshold() {
        let mut assessment = RiskAssessment::new();
        assessment.add(RiskRule::MissingMetadata, "none");
        assessment.add(RiskRule::LosslessFormat, "png");
        assert_eq!(assessment.score(), 50);
        assert!(!assessment.is_high_risk());

        assessment.add(RiskRule::GenerativeResolution, "size");
        assert!(assessment.is_high_risk());
    }

    #[test]
    fn test_only_geometry_rules_need_dimensions() {
        assert!(RiskRule::SquareAspect.needs_dimensions());
        assert!(RiskRule::GenerativeResolution.needs_dimensions());
        assert!(!RiskRule::MissingMetadata.needs_dimensions());
        assert!(!RiskRule::LosslessFormat.needs_dimensions());
    }
}
