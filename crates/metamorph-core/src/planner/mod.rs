//! Plan generator
//!
//! Converts a snapshot delta into typed steps, inserts dependency edges, and
//! produces a valid execution order via a three-color depth-first topological
//! sort. A dependency cycle is a first-class `CycleDetected` outcome, never
//! unbounded recursion.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{info, warn};

use crate::diff::{diff, Delta, ServiceChange};
use crate::types::{StepAction, StepId, TransformationPlan, TransformationStep};

/// Plan generation error types
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("dependency cycle detected involving step '{0}'")]
    CycleDetected(String),

    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("plan '{0}' cannot be generated in its current status")]
    InvalidState(String),
}

/// Generates ordered transformation steps from a plan's snapshot pair.
#[derive(Debug, Clone, Default)]
pub struct PlanGenerator;

impl PlanGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate steps for the plan, transitioning its status
    /// created -> generating -> ready, or -> failed on any error.
    pub fn generate(&self, plan: &mut TransformationPlan) -> Result<(), PlanError> {
        if !plan.status.can_generate() {
            return Err(PlanError::InvalidState(plan.id.clone()));
        }
        plan.start_generating();

        let delta = diff(&plan.current_state, &plan.target_state);
        if let Some(resources) = &delta.resources {
            // Computed for observability; no step type consumes it yet.
            info!(plan_id = %plan.id, ?resources, "resource-policy delta detected");
        }

        match Self::order_steps(Self::synthesize_steps(&delta)) {
            Ok(steps) => {
                info!(plan_id = %plan.id, step_count = steps.len(), "plan generated");
                plan.make_ready(steps);
                Ok(())
            }
            Err(err) => {
                warn!(plan_id = %plan.id, error = %err, "plan generation failed");
                plan.fail(err.to_string());
                Err(err)
            }
        }
    }

    /// One pending step per delta entry, with dependency edges inserted.
    fn synthesize_steps(delta: &Delta) -> Vec<TransformationStep> {
        let mut steps = Vec::new();

        for change in &delta.services {
            let action = match change {
                ServiceChange::Add { service_id, config } => StepAction::AddService {
                    service_id: service_id.clone(),
                    config: config.clone(),
                },
                ServiceChange::Update {
                    service_id,
                    changed_fields,
                    config,
                } => StepAction::UpdateService {
                    service_id: service_id.clone(),
                    config: config.clone(),
                    changed_fields: changed_fields.clone(),
                },
                ServiceChange::Remove { service_id } => StepAction::RemoveService {
                    service_id: service_id.clone(),
                },
            };
            steps.push(TransformationStep::new(
                format!("step-{}", steps.len() + 1),
                action,
            ));
        }

        if let Some(routing) = &delta.routing {
            steps.push(TransformationStep::new(
                format!("step-{}", steps.len() + 1),
                StepAction::UpdateRouting {
                    routing: routing.clone(),
                },
            ));
        }

        Self::insert_dependency_edges(&mut steps);
        steps
    }

    /// Dependency rules:
    /// - every non-removal step depends on every removal step
    /// - update_service(X) depends on add_service(X) within the same plan
    /// - the routing step depends on all add/update steps
    fn insert_dependency_edges(steps: &mut [TransformationStep]) {
        let removal_ids: Vec<StepId> = steps
            .iter()
            .filter(|s| s.is_removal())
            .map(|s| s.id.clone())
            .collect();

        let add_by_service: HashMap<String, StepId> = steps
            .iter()
            .filter_map(|s| match &s.action {
                StepAction::AddService { service_id, .. } => {
                    Some((service_id.clone(), s.id.clone()))
                }
                _ => None,
            })
            .collect();

        let mutation_ids: Vec<StepId> = steps
            .iter()
            .filter(|s| {
                matches!(
                    s.action,
                    StepAction::AddService { .. } | StepAction::UpdateService { .. }
                )
            })
            .map(|s| s.id.clone())
            .collect();

        for step in steps.iter_mut() {
            if !step.is_removal() {
                for removal in &removal_ids {
                    step.add_dependency(removal.clone());
                }
            }

            match &step.action {
                StepAction::UpdateService { service_id, .. } => {
                    if let Some(add_id) = add_by_service.get(service_id) {
                        step.add_dependency(add_id.clone());
                    }
                }
                StepAction::UpdateRouting { .. } => {
                    for id in &mutation_ids {
                        step.add_dependency(id.clone());
                    }
                }
                _ => {}
            }
        }
    }

    /// Topologically order steps with three-color (white/gray/black) DFS.
    ///
    /// Dependencies are visited before the step itself; revisiting a gray
    /// node is a cycle.
    fn order_steps(steps: Vec<TransformationStep>) -> Result<Vec<TransformationStep>, PlanError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Gray,
            Black,
        }

        let index: HashMap<&str, usize> = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), i))
            .collect();

        let mut marks = vec![Mark::White; steps.len()];
        let mut order = Vec::with_capacity(steps.len());

        for start in 0..steps.len() {
            if marks[start] != Mark::White {
                continue;
            }
            marks[start] = Mark::Gray;
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];

            while let Some((node, next_dep)) = stack.last_mut() {
                let deps = &steps[*node].depends_on;
                if *next_dep < deps.len() {
                    let dep_id = &deps[*next_dep];
                    *next_dep += 1;
                    let dep = *index.get(dep_id.as_str()).ok_or_else(|| {
                        PlanError::UnknownDependency {
                            step: steps[*node].id.to_string(),
                            dependency: dep_id.to_string(),
                        }
                    })?;
                    match marks[dep] {
                        Mark::White => {
                            marks[dep] = Mark::Gray;
                            stack.push((dep, 0));
                        }
                        Mark::Gray => {
                            return Err(PlanError::CycleDetected(dep_id.to_string()));
                        }
                        Mark::Black => {}
                    }
                } else {
                    marks[*node] = Mark::Black;
                    order.push(*node);
                    stack.pop();
                }
            }
        }

        let mut slots: Vec<Option<TransformationStep>> = steps.into_iter().map(Some).collect();
        Ok(order
            .into_iter()
            .map(|i| slots[i].take().unwrap_or_else(|| unreachable!()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ArchitectureSnapshot, PlanStatus, RoutingConfig, ServiceSpec, ServiceStatus, StepStatus,
    };

    fn plan_between(
        from: ArchitectureSnapshot,
        to: ArchitectureSnapshot,
    ) -> TransformationPlan {
        TransformationPlan::new("test", "test plan", from, to)
    }

    fn position(steps: &[TransformationStep], id: &str) -> usize {
        steps.iter().position(|s| s.id.as_str() == id).unwrap()
    }

    #[test]
    fn test_generation_on_non_created_plan_is_rejected() {
        let mut plan = plan_between(ArchitectureSnapshot::new(1), ArchitectureSnapshot::new(1));
        plan.set_status(PlanStatus::Ready);
        let err = PlanGenerator::new().generate(&mut plan).unwrap_err();
        assert!(matches!(err, PlanError::InvalidState(_)));
        assert_eq!(plan.status, PlanStatus::Ready);
    }

    #[test]
    fn test_topological_order_respects_dependency_sets() {
        let from = ArchitectureSnapshot::new(1)
            .with_service("legacy", ServiceSpec::default())
            .with_service("keep", ServiceSpec::default());
        let mut keep = ServiceSpec::default();
        keep.capabilities = vec!["x".to_string()];
        let to = ArchitectureSnapshot::new(1)
            .with_service("keep", keep)
            .with_service("fresh", ServiceSpec::default())
            .with_routing(RoutingConfig::new().with_path("p1", vec!["fresh".to_string()]));

        let mut plan = plan_between(from, to);
        PlanGenerator::new().generate(&mut plan).unwrap();
        assert_eq!(plan.status, PlanStatus::Ready);

        // Every step appears after all of its dependencies.
        for (i, step) in plan.steps.iter().enumerate() {
            for dep in &step.depends_on {
                assert!(position(&plan.steps, dep.as_str()) < i);
            }
        }

        // Every removal precedes every non-removal.
        let last_removal = plan
            .steps
            .iter()
            .rposition(|s| s.is_removal())
            .expect("removal step");
        let first_other = plan
            .steps
            .iter()
            .position(|s| !s.is_removal())
            .expect("non-removal step");
        assert!(last_removal < first_other);

        // The routing step is last and depends on all add/update steps.
        let routing = plan.steps.last().unwrap();
        assert!(matches!(routing.action, StepAction::UpdateRouting { .. }));
        let mutation_count = plan
            .steps
            .iter()
            .filter(|s| {
                matches!(
                    s.action,
                    StepAction::AddService { .. } | StepAction::UpdateService { .. }
                )
            })
            .count();
        let routing_mutation_deps = routing
            .depends_on
            .iter()
            .filter(|d| !plan.step(d.as_str()).unwrap().is_removal())
            .count();
        assert_eq!(routing_mutation_deps, mutation_count);

        // All steps start pending.
        assert!(plan.steps.iter().all(|s| s.status == StepStatus::Pending));
    }

    #[test]
    fn test_cycle_is_detected_and_plan_fails() {
        let mut a = TransformationStep::new(
            "step-1",
            StepAction::RemoveService {
                service_id: "a".to_string(),
            },
        );
        let mut b = TransformationStep::new(
            "step-2",
            StepAction::RemoveService {
                service_id: "b".to_string(),
            },
        );
        a.add_dependency(StepId::from("step-2"));
        b.add_dependency(StepId::from("step-1"));

        let err = PlanGenerator::order_steps(vec![a, b]).unwrap_err();
        assert!(matches!(err, PlanError::CycleDetected(_)));
    }

    #[test]
    fn test_unknown_dependency_is_reported() {
        let mut step = TransformationStep::new(
            "step-1",
            StepAction::RemoveService {
                service_id: "a".to_string(),
            },
        );
        step.add_dependency(StepId::from("step-9"));

        let err = PlanGenerator::order_steps(vec![step]).unwrap_err();
        assert!(matches!(err, PlanError::UnknownDependency { .. }));
    }

    #[test]
    fn test_concrete_scenario_from_v1() {
        // v1: {A: active, caps=[x]}, no routing.
        let mut a_current = ServiceSpec::default();
        a_current.status = ServiceStatus::Active;
        a_current.capabilities = vec!["x".to_string()];
        let from = ArchitectureSnapshot::new(1).with_service("A", a_current.clone());

        // target: A gains cap y, B is new, routing p1=[A, B].
        let mut a_target = a_current;
        a_target.capabilities = vec!["x".to_string(), "y".to_string()];
        let mut b_target = ServiceSpec::default();
        b_target.capabilities = vec!["z".to_string()];
        let to = ArchitectureSnapshot::new(1)
            .with_service("A", a_target)
            .with_service("B", b_target)
            .with_routing(
                RoutingConfig::new().with_path("p1", vec!["A".to_string(), "B".to_string()]),
            );

        let mut plan = plan_between(from, to);
        PlanGenerator::new().generate(&mut plan).unwrap();

        assert_eq!(plan.steps.len(), 3);
        let update_a = plan
            .steps
            .iter()
            .find(|s| matches!(&s.action, StepAction::UpdateService { service_id, .. } if service_id == "A"))
            .unwrap();
        assert!(update_a.depends_on.is_empty());

        let add_b = plan
            .steps
            .iter()
            .find(|s| matches!(&s.action, StepAction::AddService { service_id, .. } if service_id == "B"))
            .unwrap();

        let routing = plan.steps.last().unwrap();
        assert!(matches!(routing.action, StepAction::UpdateRouting { .. }));
        assert!(routing.depends_on.contains(&add_b.id));
        assert!(routing.depends_on.contains(&update_a.id));
    }
}
