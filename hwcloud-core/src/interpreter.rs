//! Interpreter - Execute Effects using a Provider
//!
//! The Interpreter executes Effects contained in a Plan in order, resolving
//! references against the states produced so far. This is where side
//! effects actually occur.

use std::collections::HashMap;

use log::{debug, info};

use crate::effect::Effect;
use crate::graph::resolve_resource;
use crate::plan::Plan;
use crate::provider::{Provider, ProviderError, ProviderResult};
use crate::resource::{Resource, ResourceId, State};

/// Result of executing each Effect
#[derive(Debug)]
pub enum EffectOutcome {
    /// Data source read succeeded
    Read { state: State },
    /// Create succeeded
    Created { state: State },
    /// Update succeeded
    Updated { state: State },
    /// Replace succeeded
    Replaced { state: State },
    /// Delete succeeded
    Deleted,
}

/// Result of executing the entire Plan
#[derive(Debug, Default)]
pub struct ApplyResult {
    pub outcomes: Vec<(ResourceId, Result<EffectOutcome, ProviderError>)>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }

    /// Errors of failed Effects
    pub fn errors(&self) -> impl Iterator<Item = &ProviderError> {
        self.outcomes.iter().filter_map(|(_, r)| r.as_ref().err())
    }
}

/// Interpreter that executes Effects using a Provider
pub struct Interpreter<'a, P: Provider> {
    provider: &'a P,
}

impl<'a, P: Provider> Interpreter<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// Execute a Plan, updating `states` as Effects succeed
    ///
    /// Execution stops at the first failure.
    pub async fn apply(&self, plan: &Plan, states: &mut HashMap<ResourceId, State>) -> ApplyResult {
        let mut result = ApplyResult::default();

        for effect in plan.effects() {
            let id = effect.resource_id().clone();
            debug!("{} {}", effect.symbol(), id);
            let outcome = self
                .execute_effect(effect, states)
                .await
                .map_err(|e| {
                    if e.resource_id.is_some() {
                        e
                    } else {
                        e.for_resource(id.clone())
                    }
                });

            let failed = outcome.is_err();
            if failed {
                result.failure_count += 1;
            } else {
                result.success_count += 1;
            }
            result.outcomes.push((id, outcome));
            if failed {
                break;
            }
        }

        result
    }

    /// Execute a single Effect
    async fn execute_effect(
        &self,
        effect: &Effect,
        states: &mut HashMap<ResourceId, State>,
    ) -> ProviderResult<EffectOutcome> {
        match effect {
            Effect::Read(resource) => {
                let resolved = resolve_known(resource, states)?;
                let state = self.provider.read_data_source(&resolved).await?;
                states.insert(resource.id.clone(), state.clone());
                Ok(EffectOutcome::Read { state })
            }
            Effect::Create(resource) => {
                let state = self.create(resource, states).await?;
                Ok(EffectOutcome::Created { state })
            }
            Effect::Update { id, from, to, .. } => {
                let resolved = resolve_known(to, states)?;
                let identifier = identifier_of(from)?;
                let state = self
                    .provider
                    .update(id, identifier, from, &resolved)
                    .await?
                    .with_dependencies(to.dependencies());
                info!("{}: modifications complete", id);
                states.insert(id.clone(), state.clone());
                Ok(EffectOutcome::Updated { state })
            }
            Effect::Replace { id, from, to, .. } => {
                let identifier = identifier_of(from)?;
                self.provider.delete(id, identifier, from).await?;
                states.remove(id);
                info!("{}: destruction complete", id);
                let state = self.create(to, states).await?;
                Ok(EffectOutcome::Replaced { state })
            }
            Effect::Delete { id, from } => {
                let identifier = identifier_of(from)?;
                self.provider.delete(id, identifier, from).await?;
                states.remove(id);
                info!("{}: destruction complete", id);
                Ok(EffectOutcome::Deleted)
            }
        }
    }

    async fn create(
        &self,
        resource: &Resource,
        states: &mut HashMap<ResourceId, State>,
    ) -> ProviderResult<State> {
        let resolved = resolve_known(resource, states)?;
        let state = self
            .provider
            .create(&resolved)
            .await?
            .with_dependencies(resource.dependencies());
        info!(
            "{}: creation complete [id={}]",
            resource.id,
            state.identifier.as_deref().unwrap_or("")
        );
        states.insert(resource.id.clone(), state.clone());
        Ok(state)
    }
}

fn resolve_known(resource: &Resource, states: &HashMap<ResourceId, State>) -> ProviderResult<Resource> {
    let resolved = resolve_resource(resource, states);
    let mut unresolved: Vec<&String> = resolved
        .attributes
        .iter()
        .filter(|(_, v)| !v.is_known())
        .map(|(k, _)| k)
        .collect();
    if unresolved.is_empty() {
        return Ok(resolved);
    }
    unresolved.sort();
    let names: Vec<&str> = unresolved.iter().map(|s| s.as_str()).collect();
    Err(ProviderError::new(format!(
        "Unresolved references in attributes: {}",
        names.join(", ")
    ))
    .for_resource(resource.id.clone()))
}

fn identifier_of(state: &State) -> ProviderResult<&str> {
    state.identifier.as_deref().ok_or_else(|| {
        ProviderError::new("State has no identifier").for_resource(state.id.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{BoxFuture, ResourceType};
    use crate::resource::{Reference, Value};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TestProvider {
        calls: Mutex<Vec<String>>,
    }

    impl TestProvider {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl Provider for TestProvider {
        fn name(&self) -> &'static str {
            "test"
        }

        fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
            vec![]
        }

        fn read(
            &self,
            id: &ResourceId,
            _identifier: &str,
            _prior: &State,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = id.clone();
            Box::pin(async move { Ok(State::not_found(id)) })
        }

        fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            self.record(format!("create {}", resource.id));
            let state = State::existing(resource.id.clone(), resource.attributes.clone())
                .with_identifier(format!("{}-id", resource.id.name));
            Box::pin(async move { Ok(state) })
        }

        fn update(
            &self,
            id: &ResourceId,
            _identifier: &str,
            _from: &State,
            to: &Resource,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            self.record(format!("update {}", id));
            let state = State::existing(id.clone(), to.attributes.clone()).with_identifier("x");
            Box::pin(async move { Ok(state) })
        }

        fn delete(
            &self,
            id: &ResourceId,
            identifier: &str,
            _from: &State,
        ) -> BoxFuture<'_, ProviderResult<()>> {
            self.record(format!("delete {} {}", id, identifier));
            Box::pin(async { Ok(()) })
        }

        fn import(&self, id: &ResourceId, import_id: &str) -> BoxFuture<'_, ProviderResult<State>> {
            let state = State::existing(id.clone(), HashMap::new()).with_identifier(import_id);
            Box::pin(async move { Ok(state) })
        }

        fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            let state = State::existing(resource.id.clone(), resource.attributes.clone());
            Box::pin(async move { Ok(state) })
        }
    }

    #[tokio::test]
    async fn apply_empty_plan() {
        let provider = TestProvider::default();
        let interpreter = Interpreter::new(&provider);
        let mut states = HashMap::new();
        let result = interpreter.apply(&Plan::new(), &mut states).await;

        assert!(result.is_success());
        assert_eq!(result.success_count, 0);
    }

    #[tokio::test]
    async fn references_resolve_against_created_states() {
        let provider = TestProvider::default();
        let interpreter = Interpreter::new(&provider);
        let env = ResourceId::new("env", "a");

        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("env", "a")));
        plan.add(Effect::Create(
            Resource::new("group", "b")
                .with_attribute("env_id", Value::ResourceRef(Reference::attr(env.clone(), "id"))),
        ));

        let mut states = HashMap::new();
        let result = interpreter.apply(&plan, &mut states).await;

        assert!(result.is_success());
        let group = &states[&ResourceId::new("group", "b")];
        assert_eq!(group.attributes["env_id"], Value::from("a-id"));
        assert_eq!(group.dependencies, vec![env]);
    }

    #[tokio::test]
    async fn unresolved_reference_stops_apply() {
        let provider = TestProvider::default();
        let interpreter = Interpreter::new(&provider);
        let missing = ResourceId::new("env", "missing");

        let mut plan = Plan::new();
        plan.add(Effect::Create(
            Resource::new("group", "b")
                .with_attribute("env_id", Value::ResourceRef(Reference::attr(missing, "id"))),
        ));
        plan.add(Effect::Create(Resource::new("group", "c")));

        let mut states = HashMap::new();
        let result = interpreter.apply(&plan, &mut states).await;

        assert_eq!(result.failure_count, 1);
        assert_eq!(result.outcomes.len(), 1);
        let err = result.errors().next().unwrap();
        assert_eq!(
            err.to_string(),
            "[group.b] Unresolved references in attributes: env_id"
        );
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_deletes_then_creates() {
        let provider = TestProvider::default();
        let interpreter = Interpreter::new(&provider);
        let id = ResourceId::new("group", "b");
        let from = State::existing(id.clone(), HashMap::new()).with_identifier("old");

        let mut plan = Plan::new();
        plan.add(Effect::Replace {
            id: id.clone(),
            from,
            to: Resource::new("group", "b").with_attribute("instance_id", "new"),
            changed_attributes: vec!["instance_id".to_string()],
        });

        let mut states = HashMap::new();
        let result = interpreter.apply(&plan, &mut states).await;

        assert!(result.is_success());
        assert_eq!(
            *provider.calls.lock().unwrap(),
            vec!["delete group.b old".to_string(), "create group.b".to_string()]
        );
        assert_eq!(states[&id].identifier.as_deref(), Some("b-id"));
    }
}
