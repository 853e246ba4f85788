//! Engine - validate, refresh, plan, apply, destroy and import
//!
//! The engine drives a Provider from parsed configuration and a map of
//! known states. Persisting those states is the caller's job.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use crate::differ::{Diff, diff};
use crate::effect::Effect;
use crate::graph::{GraphError, destroy_order, resolve_resource, sort_by_dependencies};
use crate::interpreter::{ApplyResult, Interpreter};
use crate::plan::Plan;
use crate::provider::{Provider, ProviderError};
use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::{ResourceKind, ResourceSchema, TypeError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{id}: unsupported resource type")]
    UnknownResourceType { id: ResourceId },

    #[error("{id}: {}", .errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Validation { id: ResourceId, errors: Vec<TypeError> },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("{}", .0.detailed())]
    Provider(#[from] ProviderError),

    #[error("{0}: resource type does not support import")]
    NotImportable(ResourceId),

    #[error("{0}: resource already managed")]
    AlreadyManaged(ResourceId),

    #[error("{id}: cannot import non-existent remote object '{import_id}'")]
    ImportNotFound { id: ResourceId, import_id: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

pub struct Engine<P: Provider> {
    provider: P,
    schemas: HashMap<String, ResourceSchema>,
}

impl<P: Provider> Engine<P> {
    pub fn new(provider: P) -> Self {
        let schemas = provider
            .resource_types()
            .into_iter()
            .map(|t| (t.name().to_string(), t.schema()))
            .collect();
        Self { provider, schemas }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn schema(&self, id: &ResourceId) -> Option<&ResourceSchema> {
        let schema = self.schemas.get(&id.resource_type)?;
        let expected = if id.is_data_source() {
            ResourceKind::DataSource
        } else {
            ResourceKind::Resource
        };
        (schema.kind == expected).then_some(schema)
    }

    /// Check every resource against its schema and the dependency graph
    ///
    /// Returns deprecation warnings.
    pub fn validate(&self, resources: &[Resource]) -> EngineResult<Vec<String>> {
        let mut warnings = Vec::new();
        for resource in resources {
            let schema = self
                .schema(&resource.id)
                .ok_or_else(|| EngineError::UnknownResourceType {
                    id: resource.id.clone(),
                })?;
            schema
                .validate(&resource.attributes)
                .map_err(|errors| EngineError::Validation {
                    id: resource.id.clone(),
                    errors,
                })?;
            for warning in schema.deprecation_warnings(&resource.attributes) {
                warnings.push(format!("{}: {}", resource.id, warning));
            }
        }
        sort_by_dependencies(resources)?;
        Ok(warnings)
    }

    /// Re-read every managed resource; resources gone from the cloud are dropped
    pub async fn refresh(&self, states: &mut HashMap<ResourceId, State>) -> EngineResult<()> {
        let mut ids: Vec<ResourceId> = states
            .keys()
            .filter(|id| !id.is_data_source())
            .cloned()
            .collect();
        ids.sort();

        for id in ids {
            let Some(prior) = states.get(&id).cloned() else {
                continue;
            };
            let Some(identifier) = prior.identifier.as_deref() else {
                states.remove(&id);
                continue;
            };
            debug!("{}: refreshing state [id={}]", id, identifier);
            let current = self
                .provider
                .read(&id, identifier, &prior)
                .await
                .map_err(|e| e.for_resource(id.clone()))?;
            if current.exists {
                states.insert(id.clone(), current.with_dependencies(prior.dependencies));
            } else {
                warn!("{}: resource no longer exists, removing from state", id);
                states.remove(&id);
            }
        }
        Ok(())
    }

    /// Compute the Effects needed to reach the configuration
    ///
    /// Data sources whose inputs are known are read now and stored in
    /// `states`; the rest become Read effects.
    pub async fn plan(
        &self,
        resources: &[Resource],
        states: &mut HashMap<ResourceId, State>,
    ) -> EngineResult<Plan> {
        let warnings = self.validate(resources)?;
        let sorted = sort_by_dependencies(resources)?;

        let mut plan = Plan::new();
        for warning in warnings {
            plan.add_warning(warning);
        }

        let configured: HashSet<&ResourceId> = resources.iter().map(|r| &r.id).collect();
        states.retain(|id, _| !id.is_data_source() || configured.contains(id));

        let orphans: Vec<State> = states
            .values()
            .filter(|s| !configured.contains(&s.id))
            .cloned()
            .collect();
        for id in destroy_order(&orphans) {
            if let Some(from) = states.get(&id) {
                plan.add(Effect::Delete {
                    id: id.clone(),
                    from: from.clone(),
                });
            }
        }

        // Projected states: what references will see once earlier Effects ran
        let mut planned: HashMap<ResourceId, State> = states.clone();

        for resource in &sorted {
            let resolved = resolve_resource(resource, &planned);

            if resource.is_data_source() {
                if resolved.attributes.values().all(Value::is_known) {
                    let state = self
                        .provider
                        .read_data_source(&resolved)
                        .await
                        .map_err(|e| e.for_resource(resource.id.clone()))?;
                    states.insert(resource.id.clone(), state.clone());
                    planned.insert(resource.id.clone(), state);
                } else {
                    plan.add(Effect::Read(resource.clone()));
                    planned.remove(&resource.id);
                }
                continue;
            }

            let current = states
                .get(&resource.id)
                .cloned()
                .unwrap_or_else(|| State::not_found(resource.id.clone()));

            match diff(&resolved, &current, self.schema(&resource.id)) {
                Diff::Create(_) => {
                    plan.add(Effect::Create(resource.clone()));
                    planned.remove(&resource.id);
                }
                Diff::Update {
                    id,
                    from,
                    changed_attributes,
                    ..
                } => {
                    let mut projected = from.clone();
                    for name in &changed_attributes {
                        let value = resolved.attributes.get(name).cloned().unwrap_or(Value::Unknown);
                        projected.attributes.insert(name.clone(), value);
                    }
                    planned.insert(id.clone(), projected);
                    plan.add(Effect::Update {
                        id,
                        from,
                        to: resource.clone(),
                        changed_attributes,
                    });
                }
                Diff::Replace {
                    id,
                    from,
                    changed_attributes,
                    ..
                } => {
                    planned.remove(&id);
                    plan.add(Effect::Replace {
                        id,
                        from,
                        to: resource.clone(),
                        changed_attributes,
                    });
                }
                Diff::NoChange(_) => {}
            }
        }

        Ok(plan)
    }

    /// Execute a Plan, updating `states` as Effects succeed
    pub async fn apply(&self, plan: &Plan, states: &mut HashMap<ResourceId, State>) -> ApplyResult {
        let result = Interpreter::new(&self.provider).apply(plan, states).await;
        info!(
            "Apply finished: {} succeeded, {} failed",
            result.success_count, result.failure_count
        );
        result
    }

    /// Delete effects for every managed resource, dependents first
    pub fn destroy_plan(&self, states: &HashMap<ResourceId, State>) -> Plan {
        let managed: Vec<State> = states
            .values()
            .filter(|s| !s.id.is_data_source())
            .cloned()
            .collect();
        let mut plan = Plan::new();
        for id in destroy_order(&managed) {
            if let Some(from) = states.get(&id) {
                plan.add(Effect::Delete {
                    id: id.clone(),
                    from: from.clone(),
                });
            }
        }
        plan
    }

    /// Delete every managed resource; data source states go with them
    pub async fn destroy(&self, states: &mut HashMap<ResourceId, State>) -> ApplyResult {
        let plan = self.destroy_plan(states);
        let result = self.apply(&plan, states).await;
        if result.is_success() {
            states.retain(|id, _| !id.is_data_source());
        }
        result
    }

    /// Bring an existing cloud object under management
    pub async fn import(
        &self,
        id: &ResourceId,
        import_id: &str,
        states: &mut HashMap<ResourceId, State>,
    ) -> EngineResult<State> {
        if states.get(id).is_some_and(|s| s.exists) {
            return Err(EngineError::AlreadyManaged(id.clone()));
        }
        let schema = self
            .schema(id)
            .ok_or_else(|| EngineError::UnknownResourceType { id: id.clone() })?;
        if !schema.importable {
            return Err(EngineError::NotImportable(id.clone()));
        }

        let imported = self
            .provider
            .import(id, import_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        let Some(identifier) = imported.identifier.clone() else {
            return Err(EngineError::ImportNotFound {
                id: id.clone(),
                import_id: import_id.to_string(),
            });
        };

        let state = self
            .provider
            .read(id, &identifier, &imported)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        if !state.exists {
            return Err(EngineError::ImportNotFound {
                id: id.clone(),
                import_id: import_id.to_string(),
            });
        }
        info!("{}: import complete [id={}]", id, identifier);
        states.insert(id.clone(), state.clone());
        Ok(state)
    }
}
