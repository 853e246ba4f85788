use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::warn;

use hwcloud_core::effect::Effect;
use hwcloud_core::engine::Engine;
use hwcloud_core::flatmap::flatten;
use hwcloud_core::graph::sort_by_dependencies;
use hwcloud_core::interpreter::{ApplyResult, EffectOutcome};
use hwcloud_core::parser::{self, ParsedFile};
use hwcloud_core::plan::Plan;
use hwcloud_core::resource::{Resource, ResourceId, State, Value};
use hwcloud_core::schema::{ResourceKind, ResourceSchema};
use hwcloud_provider::HuaweiCloudProvider;
use hwcloud_provider::resources::resource_types;
use hwcloud_state::{LocalBackend, LockInfo, StateBackend, StateFile};

#[derive(Parser)]
#[command(name = "hwcloud")]
#[command(about = "Manage Huawei Cloud resources from HCL configuration", long_about = None)]
struct Cli {
    /// Path to the state file
    #[arg(long, global = true, default_value = LocalBackend::DEFAULT_STATE_FILE)]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "main.tf")]
        file: PathBuf,
    },
    /// Show what apply would change
    Plan {
        #[arg(default_value = "main.tf")]
        file: PathBuf,
    },
    /// Create, update and delete resources to match the configuration
    Apply {
        #[arg(default_value = "main.tf")]
        file: PathBuf,
    },
    /// Destroy every resource in the state
    Destroy {
        #[arg(default_value = "main.tf")]
        file: PathBuf,

        /// Skip the confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },
    /// Bring an existing cloud object under management
    Import {
        /// Resource address, e.g. huaweicloud_apig_group.test
        address: String,
        /// Import ID, e.g. {instance_id}/{id}
        id: String,

        #[arg(long, default_value = "main.tf")]
        file: PathBuf,
    },
    /// Inspect the state file
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// List resource addresses in the state
    List,
    /// Show the attributes of one resource
    Show { address: String },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let backend = LocalBackend::with_path(cli.state);

    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Plan { file } => run_plan(&file, &backend).await,
        Commands::Apply { file } => run_apply(&file, &backend).await,
        Commands::Destroy { file, auto_approve } => run_destroy(&file, &backend, auto_approve).await,
        Commands::Import { address, id, file } => run_import(&file, &backend, &address, &id).await,
        Commands::State { command } => match command {
            StateCommands::List => run_state_list(&backend).await,
            StateCommands::Show { address } => run_state_show(&backend, &address).await,
        },
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn get_schemas() -> HashMap<String, ResourceSchema> {
    resource_types()
        .into_iter()
        .map(|t| (t.name().to_string(), t.schema()))
        .collect()
}

fn load_configuration(file: &Path) -> Result<ParsedFile, String> {
    let content = fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
    parser::parse(&content).map_err(|e| format!("Parse error in {}: {}", file.display(), e))
}

/// Check every resource against its schema; returns deprecation warnings
fn validate_resources(
    resources: &[Resource],
    schemas: &HashMap<String, ResourceSchema>,
) -> Result<Vec<String>, String> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for resource in resources {
        let expected = if resource.is_data_source() {
            ResourceKind::DataSource
        } else {
            ResourceKind::Resource
        };
        let Some(schema) = schemas
            .get(&resource.id.resource_type)
            .filter(|s| s.kind == expected)
        else {
            errors.push(format!("{}: unsupported resource type", resource.id));
            continue;
        };
        if let Err(type_errors) = schema.validate(&resource.attributes) {
            for e in type_errors {
                errors.push(format!("{}: {}", resource.id, e));
            }
        }
        for warning in schema.deprecation_warnings(&resource.attributes) {
            warnings.push(format!("{}: {}", resource.id, warning));
        }
    }

    if let Err(e) = sort_by_dependencies(resources) {
        errors.push(e.to_string());
    }
    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(format!("Validation failed:\n  {}", errors.join("\n  ")))
    }
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        println!("{} {}", "Warning:".yellow().bold(), warning);
    }
}

fn get_provider(parsed: &ParsedFile) -> Result<HuaweiCloudProvider, String> {
    let block = parsed
        .provider("huaweicloud")
        .map(|p| p.attributes.clone())
        .unwrap_or_default();
    HuaweiCloudProvider::from_provider_block(&block)
        .map_err(|e| format!("Provider configuration error: {}", e))
}

fn run_validate(file: &Path) -> Result<(), String> {
    let parsed = load_configuration(file)?;
    println!("{}", "Validating...".cyan());

    let warnings = validate_resources(&parsed.resources, &get_schemas())?;
    print_warnings(&warnings);

    println!(
        "{}",
        format!(
            "✓ {} resources validated successfully.",
            parsed.resources.len()
        )
        .green()
        .bold()
    );
    for resource in &parsed.resources {
        println!("  • {}", resource.id);
    }
    Ok(())
}

async fn load_states(backend: &LocalBackend) -> Result<(StateFile, HashMap<ResourceId, State>), String> {
    let file = backend
        .read_state()
        .await
        .map_err(|e| format!("Failed to read state: {}", e))?
        .unwrap_or_default();
    let states = file
        .to_states()
        .map_err(|e| format!("Failed to load state: {}", e))?;
    Ok((file, states))
}

async fn save_states(
    backend: &LocalBackend,
    file: &mut StateFile,
    states: &HashMap<ResourceId, State>,
) -> Result<(), String> {
    file.replace_states(states);
    file.increment_serial();
    backend
        .write_state(file)
        .await
        .map_err(|e| format!("Failed to write state: {}", e))
}

async fn acquire_lock(backend: &LocalBackend, operation: &str) -> Result<LockInfo, String> {
    backend
        .acquire_lock(operation)
        .await
        .map_err(|e| format!("Failed to lock state: {}", e))
}

async fn release_lock(backend: &LocalBackend, lock: &LockInfo) {
    if let Err(e) = backend.release_lock(lock).await {
        warn!("failed to release state lock {}: {}", lock.id, e);
    }
}

async fn run_plan(file: &Path, backend: &LocalBackend) -> Result<(), String> {
    let parsed = load_configuration(file)?;
    let schemas = get_schemas();
    validate_resources(&parsed.resources, &schemas)?;

    let engine = Engine::new(get_provider(&parsed)?);
    let (_, mut states) = load_states(backend).await?;
    engine
        .refresh(&mut states)
        .await
        .map_err(|e| format!("Refresh failed: {}", e))?;
    let plan = engine
        .plan(&parsed.resources, &mut states)
        .await
        .map_err(|e| format!("Plan failed: {}", e))?;
    print_plan(&plan, &schemas);
    Ok(())
}

async fn run_apply(file: &Path, backend: &LocalBackend) -> Result<(), String> {
    let parsed = load_configuration(file)?;
    let schemas = get_schemas();
    validate_resources(&parsed.resources, &schemas)?;
    let engine = Engine::new(get_provider(&parsed)?);

    let lock = acquire_lock(backend, "apply").await?;
    let result = apply_locked(&engine, &parsed, backend, &schemas).await;
    release_lock(backend, &lock).await;
    result
}

async fn apply_locked(
    engine: &Engine<HuaweiCloudProvider>,
    parsed: &ParsedFile,
    backend: &LocalBackend,
    schemas: &HashMap<String, ResourceSchema>,
) -> Result<(), String> {
    let (mut file, mut states) = load_states(backend).await?;
    engine
        .refresh(&mut states)
        .await
        .map_err(|e| format!("Refresh failed: {}", e))?;
    let plan = engine
        .plan(&parsed.resources, &mut states)
        .await
        .map_err(|e| format!("Plan failed: {}", e))?;
    print_plan(&plan, schemas);

    if plan.mutation_count() == 0 {
        return save_states(backend, &mut file, &states).await;
    }

    println!();
    println!("{}", "Applying changes...".cyan().bold());
    let result = engine.apply(&plan, &mut states).await;
    print_outcomes(&result);
    save_states(backend, &mut file, &states).await?;
    finish(&result, "Apply")
}

async fn run_destroy(file: &Path, backend: &LocalBackend, auto_approve: bool) -> Result<(), String> {
    let parsed = load_configuration(file)?;
    let schemas = get_schemas();
    let engine = Engine::new(get_provider(&parsed)?);

    let lock = acquire_lock(backend, "destroy").await?;
    let result = destroy_locked(&engine, backend, &schemas, auto_approve).await;
    release_lock(backend, &lock).await;
    result
}

async fn destroy_locked(
    engine: &Engine<HuaweiCloudProvider>,
    backend: &LocalBackend,
    schemas: &HashMap<String, ResourceSchema>,
    auto_approve: bool,
) -> Result<(), String> {
    let (mut file, mut states) = load_states(backend).await?;
    engine
        .refresh(&mut states)
        .await
        .map_err(|e| format!("Refresh failed: {}", e))?;

    let plan = engine.destroy_plan(&states);
    if plan.is_empty() {
        println!("{}", "No resources to destroy.".yellow());
        return save_states(backend, &mut file, &states).await;
    }
    print_plan(&plan, schemas);

    if !auto_approve && !confirm("Do you really want to destroy all resources?")? {
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    println!();
    println!("{}", "Destroying resources...".red().bold());
    let result = engine.destroy(&mut states).await;
    print_outcomes(&result);
    save_states(backend, &mut file, &states).await?;
    finish(&result, "Destroy")
}

fn confirm(question: &str) -> Result<bool, String> {
    println!();
    println!("{}", question.bold());
    println!("  Only 'yes' will be accepted to approve.");
    print!("\n  Enter a value: ");
    io::stdout()
        .flush()
        .map_err(|e| format!("Failed to write prompt: {}", e))?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|e| format!("Failed to read answer: {}", e))?;
    Ok(answer.trim() == "yes")
}

async fn run_import(
    file: &Path,
    backend: &LocalBackend,
    address: &str,
    import_id: &str,
) -> Result<(), String> {
    let parsed = load_configuration(file)?;
    let id = ResourceId::parse_address(address)
        .filter(|id| !id.is_data_source())
        .ok_or_else(|| format!("Invalid resource address: {}", address))?;
    if !parsed.resources.iter().any(|r| r.id == id) {
        return Err(format!(
            "{} is not declared in {}; add a resource block before importing",
            address,
            file.display()
        ));
    }
    let engine = Engine::new(get_provider(&parsed)?);

    let lock = acquire_lock(backend, "import").await?;
    let result = async {
        let (mut file, mut states) = load_states(backend).await?;
        let state = engine
            .import(&id, import_id, &mut states)
            .await
            .map_err(|e| format!("Import failed: {}", e))?;
        save_states(backend, &mut file, &states).await?;
        println!(
            "{} {} [id={}]",
            "✓ Imported".green().bold(),
            id,
            state.identifier.as_deref().unwrap_or_default()
        );
        Ok::<(), String>(())
    }
    .await;
    release_lock(backend, &lock).await;
    result
}

async fn run_state_list(backend: &LocalBackend) -> Result<(), String> {
    let (file, _) = load_states(backend).await?;
    let mut addresses: Vec<String> = file.resources.iter().map(|r| r.address()).collect();
    addresses.sort();
    for address in addresses {
        println!("{}", address);
    }
    Ok(())
}

async fn run_state_show(backend: &LocalBackend, address: &str) -> Result<(), String> {
    let id = ResourceId::parse_address(address)
        .ok_or_else(|| format!("Invalid resource address: {}", address))?;
    let (_, states) = load_states(backend).await?;
    let state = states
        .get(&id)
        .ok_or_else(|| format!("{} is not in the state", address))?;
    let schemas = get_schemas();
    let schema = schemas.get(&id.resource_type);

    println!("{}", format!("# {}:", id).bold());
    println!(
        "  {:<32} = {}",
        "id",
        state.identifier.as_deref().unwrap_or_default()
    );
    for (key, value) in flatten(&state.attributes) {
        let shown = if is_sensitive(schema, &key) {
            "(sensitive)".to_string()
        } else {
            value
        };
        println!("  {:<32} = {}", key, shown);
    }
    Ok(())
}

fn is_sensitive(schema: Option<&ResourceSchema>, key: &str) -> bool {
    let top = key.split('.').next().unwrap_or(key);
    schema
        .and_then(|s| s.attributes.get(top))
        .is_some_and(|a| a.sensitive)
}

fn print_plan(plan: &Plan, schemas: &HashMap<String, ResourceSchema>) {
    print_warnings(plan.warnings());

    if plan.mutation_count() == 0 {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();
    for effect in plan.effects() {
        let schema = schemas.get(&effect.resource_id().resource_type);
        println!("{}", format_effect(effect));
        for line in effect_details(effect, schema) {
            println!("      {}", line);
        }
        println!();
    }
    println!("{}", plan.summary().to_string().bold());
}

fn format_effect(effect: &Effect) -> String {
    let id = effect.resource_id().to_string();
    match effect {
        Effect::Read(_) => format!("  {} {}", effect.symbol().cyan(), id.cyan()),
        Effect::Create(_) => format!("  {} {}", effect.symbol().green().bold(), id.green()),
        Effect::Update { .. } => format!("  {} {}", effect.symbol().yellow().bold(), id.yellow()),
        Effect::Replace { .. } => format!(
            "  {} {} {}",
            effect.symbol().magenta().bold(),
            id.magenta(),
            "(must be replaced)".dimmed()
        ),
        Effect::Delete { .. } => format!("  {} {}", effect.symbol().red().bold(), id.red()),
    }
}

/// Attribute lines shown under an Effect
fn effect_details(effect: &Effect, schema: Option<&ResourceSchema>) -> Vec<String> {
    let shown = |key: &str, value: &Value| {
        if is_sensitive(schema, key) {
            "(sensitive)".to_string()
        } else {
            format_value(value)
        }
    };

    match effect {
        Effect::Read(resource) | Effect::Create(resource) => {
            let sorted: BTreeMap<&String, &Value> = resource.attributes.iter().collect();
            sorted
                .into_iter()
                .map(|(k, v)| format!("{} = {}", k, shown(k, v)))
                .collect()
        }
        Effect::Update {
            from,
            to,
            changed_attributes,
            ..
        }
        | Effect::Replace {
            from,
            to,
            changed_attributes,
            ..
        } => changed_attributes
            .iter()
            .map(|k| {
                let old = from.attributes.get(k).map_or("null".to_string(), |v| shown(k, v));
                let new = to.attributes.get(k).map_or("null".to_string(), |v| shown(k, v));
                let forces = schema
                    .and_then(|s| s.attributes.get(k))
                    .is_some_and(|a| a.force_new);
                if forces && matches!(effect, Effect::Replace { .. }) {
                    format!("{}: {} → {} {}", k, old, new, "(forces replacement)".red())
                } else {
                    format!("{}: {} → {}", k, old, new)
                }
            })
            .collect(),
        Effect::Delete { from, .. } => from
            .identifier
            .iter()
            .map(|identifier| format!("id = \"{}\"", identifier))
            .collect(),
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(i) => i.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let items: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Map(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let entries: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{} = {}", k, format_value(v)))
                .collect();
            format!("{{ {} }}", entries.join(", "))
        }
        Value::ResourceRef(reference) => reference.to_string(),
        Value::Template(_) | Value::Unknown => "(known after apply)".to_string(),
    }
}

fn print_outcomes(result: &ApplyResult) {
    for (id, outcome) in &result.outcomes {
        match outcome {
            Ok(EffectOutcome::Read { .. }) => println!("  {} {} read", "✓".green(), id),
            Ok(EffectOutcome::Created { state }) => println!(
                "  {} {} created [id={}]",
                "✓".green(),
                id,
                state.identifier.as_deref().unwrap_or_default()
            ),
            Ok(EffectOutcome::Updated { .. }) => println!("  {} {} updated", "✓".green(), id),
            Ok(EffectOutcome::Replaced { state }) => println!(
                "  {} {} replaced [id={}]",
                "✓".green(),
                id,
                state.identifier.as_deref().unwrap_or_default()
            ),
            Ok(EffectOutcome::Deleted) => println!("  {} {} destroyed", "✓".green(), id),
            Err(e) => println!("  {} {}: {}", "✗".red(), id, e.detailed()),
        }
    }
}

/// Resources added, changed and destroyed by an apply
fn outcome_counts(result: &ApplyResult) -> (usize, usize, usize) {
    let (mut added, mut changed, mut destroyed) = (0, 0, 0);
    for (_, outcome) in &result.outcomes {
        match outcome {
            Ok(EffectOutcome::Created { .. }) => added += 1,
            Ok(EffectOutcome::Updated { .. }) => changed += 1,
            Ok(EffectOutcome::Replaced { .. }) => {
                added += 1;
                destroyed += 1;
            }
            Ok(EffectOutcome::Deleted) => destroyed += 1,
            Ok(EffectOutcome::Read { .. }) | Err(_) => {}
        }
    }
    (added, changed, destroyed)
}

fn finish(result: &ApplyResult, operation: &str) -> Result<(), String> {
    let (added, changed, destroyed) = outcome_counts(result);
    if !result.is_success() {
        return Err(format!(
            "{} failed: {} error(s); state saved with {} added, {} changed, {} destroyed",
            operation, result.failure_count, added, changed, destroyed
        ));
    }
    println!();
    println!(
        "{}",
        format!(
            "{} complete! Resources: {} added, {} changed, {} destroyed.",
            operation, added, changed, destroyed
        )
        .green()
        .bold()
    );
    Ok(())
}
