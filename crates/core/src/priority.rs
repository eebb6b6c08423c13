use std::collections::BTreeMap;

use thiserror::Error;
use types::{ConstraintPriority, PriorityProfile};

/// Whether a constraint id names one of the two uniqueness rules (I1/I2) that may never be
/// disabled, or a negotiable rule.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConstraintCategory {
    Hard,
    Soft,
}

/// `(id, category, balanced-preset default)`. Four hard constraints plus the eight named
/// `SoftConstraintScorer` rules - twelve entries total, grounded in
/// `constraint_priority_manager.py`'s `DEFAULT_CONSTRAINTS`.
const DEFAULT_CONSTRAINTS: &[(&str, ConstraintCategory, ConstraintPriority)] = &[
    ("no_class_conflicts", ConstraintCategory::Hard, ConstraintPriority::Critical),
    ("no_teacher_conflicts", ConstraintCategory::Hard, ConstraintPriority::Critical),
    ("teacher_availability", ConstraintCategory::Hard, ConstraintPriority::High),
    ("block_integrity", ConstraintCategory::Hard, ConstraintPriority::High),
    ("teacher_time_pref", ConstraintCategory::Soft, ConstraintPriority::Medium),
    ("balanced_daily_load", ConstraintCategory::Soft, ConstraintPriority::High),
    ("lesson_spacing", ConstraintCategory::Soft, ConstraintPriority::Medium),
    ("difficult_morning", ConstraintCategory::Soft, ConstraintPriority::Low),
    ("teacher_load_balance", ConstraintCategory::Soft, ConstraintPriority::Medium),
    ("consecutive_block_bonus", ConstraintCategory::Soft, ConstraintPriority::Low),
    ("no_gaps", ConstraintCategory::Soft, ConstraintPriority::High),
    ("lunch_light", ConstraintCategory::Soft, ConstraintPriority::Optional),
];

/// The two ids the registry refuses to ever drop below `Critical` - I1 and I2 in spec terms.
const NEVER_BELOW_CRITICAL: &[&str] = &["no_class_conflicts", "no_teacher_conflicts"];

#[derive(Debug, Error)]
pub enum PriorityError {
    #[error("unknown constraint id: {0}")]
    UnknownConstraint(String),
    #[error("constraint {0} must never be set below Critical")]
    RefusedBelowCritical(String),
}

/// Maps each constraint id to a `ConstraintPriority` level, and each level to a penalty (used
/// against violations) and a scoring weight (used for bonuses). Built-in presets mirror
/// `constraint_priority_manager.py::create_preset_profile` exactly.
#[derive(Clone, Debug)]
pub struct PriorityRegistry {
    priorities: BTreeMap<String, ConstraintPriority>,
    categories: BTreeMap<String, ConstraintCategory>,
}

impl Default for PriorityRegistry {
    fn default() -> Self {
        Self::preset("balanced")
    }
}

impl PriorityRegistry {
    /// One of the four named presets from spec §6.4. Unknown names fall back to `balanced`.
    pub fn preset(name: &str) -> Self {
        let mut priorities = BTreeMap::new();
        let mut categories = BTreeMap::new();
        for &(id, category, default_priority) in DEFAULT_CONSTRAINTS {
            categories.insert(id.to_string(), category);
            let level = match (name, category) {
                ("strict", ConstraintCategory::Hard) => ConstraintPriority::Critical,
                ("strict", ConstraintCategory::Soft) => ConstraintPriority::High,
                ("flexible", ConstraintCategory::Hard) => ConstraintPriority::High,
                ("flexible", ConstraintCategory::Soft) => ConstraintPriority::Low,
                ("speed", ConstraintCategory::Hard) => {
                    if NEVER_BELOW_CRITICAL.contains(&id) {
                        ConstraintPriority::Critical
                    } else {
                        ConstraintPriority::High
                    }
                }
                ("speed", ConstraintCategory::Soft) => ConstraintPriority::Optional,
                _ => default_priority,
            };
            priorities.insert(id.to_string(), level);
        }
        Self { priorities, categories }
    }

    pub fn from_profile(profile: &PriorityProfile) -> Self {
        let mut registry = Self::preset("balanced");
        for (id, level) in &profile.priorities {
            let _ = registry.set_priority(id, *level);
        }
        registry
    }

    pub fn to_profile(&self, profile_name: impl Into<String>) -> PriorityProfile {
        PriorityProfile {
            profile_name: profile_name.into(),
            priorities: self.priorities.clone(),
        }
    }

    pub fn priority(&self, id: &str) -> Option<ConstraintPriority> {
        self.priorities.get(id).copied()
    }

    pub fn category(&self, id: &str) -> Option<ConstraintCategory> {
        self.categories.get(id).copied()
    }

    pub fn penalty(&self, id: &str) -> f64 {
        self.priority(id).map(ConstraintPriority::penalty).unwrap_or(0.0)
    }

    pub fn scoring_weight(&self, id: &str) -> f64 {
        self.priority(id).map(ConstraintPriority::scoring_weight).unwrap_or(0.0)
    }

    /// Rejects dropping `no_class_conflicts`/`no_teacher_conflicts` below `Critical`.
    pub fn set_priority(&mut self, id: &str, level: ConstraintPriority) -> Result<(), PriorityError> {
        if !self.categories.contains_key(id) {
            return Err(PriorityError::UnknownConstraint(id.to_string()));
        }
        if NEVER_BELOW_CRITICAL.contains(&id) && level != ConstraintPriority::Critical {
            return Err(PriorityError::RefusedBelowCritical(id.to_string()));
        }
        self.priorities.insert(id.to_string(), level);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), PriorityError> {
        for &id in NEVER_BELOW_CRITICAL {
            if self.priorities.get(id).copied() != Some(ConstraintPriority::Critical) {
                return Err(PriorityError::RefusedBelowCritical(id.to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_preset_gives_the_hard_uniqueness_rules_critical_priority() {
        let registry = PriorityRegistry::preset("balanced");
        assert_eq!(registry.priority("no_class_conflicts"), Some(ConstraintPriority::Critical));
        assert_eq!(registry.priority("no_teacher_conflicts"), Some(ConstraintPriority::Critical));
    }

    #[test]
    fn speed_preset_still_keeps_i1_i2_critical_but_drops_soft_to_optional() {
        let registry = PriorityRegistry::preset("speed");
        assert_eq!(registry.priority("no_class_conflicts"), Some(ConstraintPriority::Critical));
        assert_eq!(registry.priority("teacher_time_pref"), Some(ConstraintPriority::Optional));
    }

    #[test]
    fn refuses_to_drop_hard_uniqueness_below_critical() {
        let mut registry = PriorityRegistry::preset("balanced");
        let err = registry.set_priority("no_teacher_conflicts", ConstraintPriority::High);
        assert!(matches!(err, Err(PriorityError::RefusedBelowCritical(_))));
    }

    #[test]
    fn unknown_constraint_id_is_rejected() {
        let mut registry = PriorityRegistry::preset("balanced");
        assert!(registry.set_priority("not_a_real_constraint", ConstraintPriority::Low).is_err());
    }
}
