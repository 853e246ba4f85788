//! Dependency ordering and reference resolution

use std::collections::{HashMap, HashSet};

use crate::resource::{Resource, ResourceId, State, TemplatePart, Value};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("{from}: reference to undeclared resource {target}")]
    UnknownReference { from: ResourceId, target: ResourceId },

    #[error("Dependency cycle between: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// Order resources so that every resource comes after the ones it references
///
/// Resources keep their declaration order wherever dependencies allow.
pub fn sort_by_dependencies(resources: &[Resource]) -> Result<Vec<Resource>, GraphError> {
    let declared: HashSet<&ResourceId> = resources.iter().map(|r| &r.id).collect();

    let mut deps: HashMap<&ResourceId, Vec<ResourceId>> = HashMap::new();
    for resource in resources {
        let resource_deps = resource.dependencies();
        for target in &resource_deps {
            if !declared.contains(target) {
                return Err(GraphError::UnknownReference {
                    from: resource.id.clone(),
                    target: target.clone(),
                });
            }
        }
        deps.insert(&resource.id, resource_deps);
    }

    let mut sorted: Vec<Resource> = Vec::with_capacity(resources.len());
    let mut emitted: HashSet<ResourceId> = HashSet::new();
    let mut remaining: Vec<&Resource> = resources.iter().collect();

    while !remaining.is_empty() {
        let ready = remaining
            .iter()
            .position(|r| deps[&r.id].iter().all(|d| emitted.contains(d)));
        match ready {
            Some(index) => {
                let resource = remaining.remove(index);
                emitted.insert(resource.id.clone());
                sorted.push(resource.clone());
            }
            None => {
                let mut names: Vec<String> = remaining.iter().map(|r| r.id.to_string()).collect();
                names.sort();
                return Err(GraphError::Cycle(names));
            }
        }
    }

    Ok(sorted)
}

/// Order states for destruction: dependents first
///
/// Dependencies on resources that are not in the list are ignored.
pub fn destroy_order(states: &[State]) -> Vec<ResourceId> {
    let present: HashSet<&ResourceId> = states.iter().map(|s| &s.id).collect();
    let mut created: Vec<ResourceId> = Vec::with_capacity(states.len());
    let mut remaining: Vec<&State> = states.iter().collect();
    remaining.sort_by(|a, b| a.id.cmp(&b.id));

    while !remaining.is_empty() {
        let ready = remaining.iter().position(|s| {
            s.dependencies
                .iter()
                .all(|d| !present.contains(d) || created.contains(d))
        });
        // Stored dependencies never form a cycle; fall back to name order if they do
        let index = ready.unwrap_or(0);
        created.push(remaining.remove(index).id.clone());
    }

    created.reverse();
    created
}

/// Replace references with values from known states
///
/// References that cannot be resolved yet become `Value::Unknown`.
pub fn resolve_value(value: &Value, states: &HashMap<ResourceId, State>) -> Value {
    match value {
        Value::ResourceRef(reference) => states
            .get(&reference.target)
            .filter(|s| s.exists)
            .and_then(|s| s.lookup(&reference.path))
            .unwrap_or(Value::Unknown),
        Value::Template(parts) => {
            let mut out = String::new();
            for part in parts {
                match part {
                    TemplatePart::Literal(s) => out.push_str(s),
                    TemplatePart::Interpolation(reference) => {
                        let resolved =
                            resolve_value(&Value::ResourceRef(reference.clone()), states);
                        match resolved {
                            Value::String(s) => out.push_str(&s),
                            Value::Int(i) => out.push_str(&i.to_string()),
                            Value::Bool(b) => out.push_str(&b.to_string()),
                            _ => return Value::Unknown,
                        }
                    }
                }
            }
            Value::String(out)
        }
        Value::List(items) => Value::List(items.iter().map(|v| resolve_value(v, states)).collect()),
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, states)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Resolve every attribute of a resource
pub fn resolve_resource(resource: &Resource, states: &HashMap<ResourceId, State>) -> Resource {
    Resource {
        id: resource.id.clone(),
        attributes: resource
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), resolve_value(v, states)))
            .collect(),
    }
}
