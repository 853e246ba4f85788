//! Plan - Collection of Effects
//!
//! A Plan is an ordered list of Effects to be executed.
//! No side effects occur until the Plan is applied.

use crate::effect::Effect;

/// Plan containing Effects to be executed
#[derive(Debug, Clone, Default)]
pub struct Plan {
    effects: Vec<Effect>,
    warnings: Vec<String>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// Deprecation warnings gathered while planning
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Number of mutating Effects
    pub fn mutation_count(&self) -> usize {
        self.effects.iter().filter(|e| e.is_mutating()).count()
    }

    /// Generate a summary of the Plan for display
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for effect in &self.effects {
            match effect {
                Effect::Read(_) => summary.read += 1,
                Effect::Create(_) => summary.add += 1,
                Effect::Update { .. } => summary.change += 1,
                Effect::Replace { .. } => {
                    summary.add += 1;
                    summary.destroy += 1;
                }
                Effect::Delete { .. } => summary.destroy += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct PlanSummary {
    pub read: usize,
    pub add: usize,
    pub change: usize,
    pub destroy: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Plan: {} to add, {} to change, {} to destroy",
            self.add, self.change, self.destroy
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Resource, ResourceId, State};

    #[test]
    fn empty_plan() {
        let plan = Plan::new();
        assert!(plan.is_empty());
        assert_eq!(plan.mutation_count(), 0);
        assert_eq!(
            plan.summary().to_string(),
            "Plan: 0 to add, 0 to change, 0 to destroy"
        );
    }

    #[test]
    fn plan_summary_counts_replace_twice() {
        let id = ResourceId::new("huaweicloud_apig_group", "c");
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("huaweicloud_apig_group", "a")));
        plan.add(Effect::Read(Resource::data("huaweicloud_availability_zones", "z")));
        plan.add(Effect::Replace {
            id: id.clone(),
            from: State::not_found(id.clone()),
            to: Resource::new("huaweicloud_apig_group", "c"),
            changed_attributes: vec!["instance_id".to_string()],
        });
        plan.add(Effect::Delete {
            id: ResourceId::new("huaweicloud_apig_group", "d"),
            from: State::not_found(id),
        });

        let summary = plan.summary();
        assert_eq!(summary.add, 2);
        assert_eq!(summary.destroy, 2);
        assert_eq!(summary.read, 1);
        assert_eq!(plan.mutation_count(), 3);
        assert_eq!(
            summary.to_string(),
            "Plan: 2 to add, 0 to change, 2 to destroy"
        );
    }
}
