//! Acceptance test harness
//!
//! Runs configurations through the engine the way the CLI does. Every step
//! applies its configuration, requires a refreshed plan to be empty and runs
//! its checks. An import step imports a resource into fresh state and
//! compares it with the applied one. The case always ends by destroying
//! everything and reading each resource back to make sure it is gone, then
//! runs the optional `check_destroy` on what was read.
//!
//! Tests against the real cloud only run when `HW_ACC` is set.

pub mod checks;

use std::collections::{BTreeSet, HashMap};

use hwcloud_core::engine::{Engine, EngineError};
use hwcloud_core::parser::{ParseError, parse};
use hwcloud_core::provider::Provider;
use hwcloud_core::resource::{ResourceId, State};
use log::{info, warn};
use regex::Regex;
use thiserror::Error;
use uuid::Uuid;

use crate::provider::HuaweiCloudProvider;
pub use checks::{
    Check, States, no_resource_attr, resource_attr, resource_attr_pair, resource_attr_set,
    resource_exists,
};

/// Set to run tests against the real cloud
pub const ACC_ENV: &str = "HW_ACC";

pub fn acc_enabled() -> bool {
    std::env::var(ACC_ENV).is_ok_and(|v| !v.is_empty())
}

/// True when acceptance tests are enabled and every variable in `required`
/// is set; logs why a test is skipped otherwise
pub fn pre_check(required: &[&str]) -> bool {
    if !acc_enabled() {
        info!("skipping acceptance test: {} is not set", ACC_ENV);
        return false;
    }
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|v| std::env::var(v).map_or(true, |s| s.is_empty()))
        .collect();
    if !missing.is_empty() {
        warn!("skipping acceptance test: missing {}", missing.join(", "));
        return false;
    }
    true
}

/// Name for test resources, e.g. `tf_test_1a2b3c4d`
pub fn random_acc_resource_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("tf_test_{}", &id[..8])
}

#[derive(Debug, Error)]
pub enum AccError {
    #[error("step {step}: {source}")]
    Parse {
        step: usize,
        #[source]
        source: ParseError,
    },

    #[error("step {step}: {source}")]
    Engine {
        step: usize,
        #[source]
        source: EngineError,
    },

    #[error("step {step}: apply failed: {}", .errors.join("; "))]
    Apply { step: usize, errors: Vec<String> },

    #[error("step {step}: expected an error matching {pattern}, got {outcome}")]
    ExpectedError {
        step: usize,
        pattern: String,
        outcome: String,
    },

    #[error("step {step}: plan not empty after apply: {summary} ({})", .resources.join(", "))]
    NonEmptyPlan {
        step: usize,
        summary: String,
        resources: Vec<String>,
    },

    #[error("step {step}: check failed: {message}")]
    Check { step: usize, message: String },

    #[error("step {step}: import of {address}: {message}")]
    Import {
        step: usize,
        address: String,
        message: String,
    },

    #[error("destroy failed: {}", .errors.join("; "))]
    Destroy { errors: Vec<String> },

    #[error("{address} still exists after destroy")]
    Dangling { address: String },
}

type ImportIdFn = Box<dyn Fn(&State) -> Result<String, String> + Send + Sync>;

/// Import the resource at `address` and compare with the applied state
pub struct ImportStep {
    pub address: String,
    id_func: Option<ImportIdFn>,
    /// Attributes the read cannot recover, e.g. passwords; prefixes match
    pub ignore: Vec<String>,
}

impl ImportStep {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            id_func: None,
            ignore: Vec::new(),
        }
    }

    /// Build the import ID from the applied state instead of using its ID
    pub fn with_id_func(
        mut self,
        f: impl Fn(&State) -> Result<String, String> + Send + Sync + 'static,
    ) -> Self {
        self.id_func = Some(Box::new(f));
        self
    }

    pub fn ignore(mut self, keys: &[&str]) -> Self {
        self.ignore = keys.iter().map(|k| k.to_string()).collect();
        self
    }
}

pub struct TestStep {
    pub config: String,
    pub checks: Vec<Check>,
    pub expect_error: Option<Regex>,
    pub imports: Vec<ImportStep>,
}

impl TestStep {
    pub fn config(config: impl Into<String>) -> Self {
        Self {
            config: config.into(),
            checks: Vec::new(),
            expect_error: None,
            imports: Vec::new(),
        }
    }

    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    pub fn checks(mut self, checks: impl IntoIterator<Item = Check>) -> Self {
        self.checks.extend(checks);
        self
    }

    /// The apply must fail with an error matching `pattern`
    pub fn expect_error(mut self, pattern: Regex) -> Self {
        self.expect_error = Some(pattern);
        self
    }

    /// Import after applying this step's configuration
    pub fn import(mut self, import: ImportStep) -> Self {
        self.imports.push(import);
        self
    }
}

#[derive(Default)]
pub struct TestCase {
    /// Runs on the states read back after destroy; every managed resource
    /// is present with `exists == false`
    pub check_destroy: Option<Check>,
    pub steps: Vec<TestStep>,
}

impl TestCase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: TestStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn check_destroy(mut self, check: Check) -> Self {
        self.check_destroy = Some(check);
        self
    }

    /// Run every step, then destroy; a failed step still destroys what it
    /// created
    pub async fn run(self, provider: HuaweiCloudProvider) -> Result<(), AccError> {
        let engine = Engine::new(provider);
        let mut states: States = HashMap::new();

        let result = self.run_steps(&engine, &mut states).await;
        let destroyed = destroy_and_verify(&engine, &mut states, self.check_destroy.as_ref()).await;
        if let (Err(_), Err(e)) = (&result, &destroyed) {
            warn!("cleanup after failed step: {}", e);
        }
        result.and(destroyed)
    }

    async fn run_steps<P: Provider>(
        &self,
        engine: &Engine<P>,
        states: &mut States,
    ) -> Result<(), AccError> {
        for (i, step) in self.steps.iter().enumerate() {
            let n = i + 1;
            info!("acceptance step {}/{}", n, self.steps.len());
            run_step(engine, states, n, step).await?;
        }
        Ok(())
    }
}

async fn run_step<P: Provider>(
    engine: &Engine<P>,
    states: &mut States,
    step: usize,
    test_step: &TestStep,
) -> Result<(), AccError> {
    let parsed = parse(&test_step.config).map_err(|source| AccError::Parse { step, source })?;

    let plan = engine.plan(&parsed.resources, states).await;
    let applied = match plan {
        Ok(plan) => {
            let result = engine.apply(&plan, states).await;
            let errors: Vec<String> = result.errors().map(|e| e.detailed()).collect();
            if errors.is_empty() { Ok(()) } else { Err(errors) }
        }
        Err(e) => Err(vec![e.to_string()]),
    };

    if let Some(pattern) = &test_step.expect_error {
        return match applied {
            Err(errors) if errors.iter().any(|e| pattern.is_match(e)) => Ok(()),
            Err(errors) => Err(AccError::ExpectedError {
                step,
                pattern: pattern.to_string(),
                outcome: errors.join("; "),
            }),
            Ok(()) => Err(AccError::ExpectedError {
                step,
                pattern: pattern.to_string(),
                outcome: "no error".to_string(),
            }),
        };
    }
    applied.map_err(|errors| AccError::Apply { step, errors })?;

    engine
        .refresh(states)
        .await
        .map_err(|source| AccError::Engine { step, source })?;
    let follow_up = engine
        .plan(&parsed.resources, states)
        .await
        .map_err(|source| AccError::Engine { step, source })?;
    if follow_up.mutation_count() > 0 {
        return Err(AccError::NonEmptyPlan {
            step,
            summary: follow_up.summary().to_string(),
            resources: follow_up
                .effects()
                .iter()
                .filter(|e| e.is_mutating())
                .map(|e| format!("{} {}", e.symbol(), e.resource_id()))
                .collect(),
        });
    }

    for check in &test_step.checks {
        check
            .run(states)
            .map_err(|message| AccError::Check { step, message })?;
    }

    for import in &test_step.imports {
        verify_import(engine, states, step, import).await?;
    }
    Ok(())
}

async fn verify_import<P: Provider>(
    engine: &Engine<P>,
    states: &States,
    step: usize,
    import: &ImportStep,
) -> Result<(), AccError> {
    let fail = |message: String| AccError::Import {
        step,
        address: import.address.clone(),
        message,
    };
    let applied = checks::state_of(states, &import.address).map_err(fail)?;
    let id = ResourceId::parse_address(&import.address)
        .ok_or_else(|| fail("invalid address".to_string()))?;
    let import_id = match &import.id_func {
        Some(f) => f(applied).map_err(fail)?,
        None => applied
            .identifier
            .clone()
            .ok_or_else(|| fail("applied state has no ID".to_string()))?,
    };

    let mut fresh: States = HashMap::new();
    let imported = engine
        .import(&id, &import_id, &mut fresh)
        .await
        .map_err(|e| fail(e.to_string()))?;

    let ignored = |key: &str| import.ignore.iter().any(|prefix| key.starts_with(prefix.as_str()));
    let expected = checks::flat_attributes(applied);
    let actual = checks::flat_attributes(&imported);
    let keys: BTreeSet<&String> = expected.keys().chain(actual.keys()).collect();
    let mut diffs = Vec::new();
    for key in keys {
        if ignored(key) {
            continue;
        }
        let (e, a) = (expected.get(key), actual.get(key));
        if e.map(String::as_str).unwrap_or_default() != a.map(String::as_str).unwrap_or_default() {
            diffs.push(format!("{}: applied {:?}, imported {:?}", key, e, a));
        }
    }
    if !diffs.is_empty() {
        return Err(fail(format!(
            "imported state differs from applied state:\n  {}",
            diffs.join("\n  ")
        )));
    }
    Ok(())
}

async fn destroy_and_verify<P: Provider>(
    engine: &Engine<P>,
    states: &mut States,
    check_destroy: Option<&Check>,
) -> Result<(), AccError> {
    let managed: Vec<State> = states
        .values()
        .filter(|s| !s.id.is_data_source() && s.exists)
        .cloned()
        .collect();

    let result = engine.destroy(states).await;
    if !result.is_success() {
        return Err(AccError::Destroy {
            errors: result.errors().map(|e| e.detailed()).collect(),
        });
    }

    let mut read_back = States::new();
    for prior in managed {
        let Some(identifier) = prior.identifier.as_deref() else {
            continue;
        };
        let current = engine
            .provider()
            .read(&prior.id, identifier, &prior)
            .await
            .map_err(|e| AccError::Destroy {
                errors: vec![e.detailed()],
            })?;
        if current.exists {
            return Err(AccError::Dangling {
                address: prior.id.to_string(),
            });
        }
        read_back.insert(prior.id.clone(), current);
    }

    match check_destroy {
        Some(check) => check
            .run(&read_back)
            .map_err(|message| AccError::Destroy { errors: vec![message] }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_names_are_distinct() {
        let a = random_acc_resource_name();
        let b = random_acc_resource_name();
        assert!(a.starts_with("tf_test_"));
        assert_eq!(a.len(), "tf_test_".len() + 8);
        assert_ne!(a, b);
    }
}
