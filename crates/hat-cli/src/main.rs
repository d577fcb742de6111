//! Automation test bench CLI
//!
//! Loads automation rules, compiles each into a positional test artifact,
//! expands declared value domains into test cases, runs the batch and
//! prints the outcomes.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use hat_core::Priority;
use hat_rule::Automation;
use hat_sched::{RunMode, Scheduler};
use hat_store::Store;
use hat_testgen::{combine, CombineRequest, ValueDomain};

struct Args {
    rules: PathBuf,
    domains: Option<PathBuf>,
    scripts_dir: PathBuf,
    db: Option<PathBuf>,
    mode: RunMode,
    interpreter: String,
    timeout_secs: u64,
    requirement: Option<String>,
    priority: Priority,
}

const USAGE: &str = "usage: hat <automations.yaml> [options]
  --domains <file>       per-entity value domain declarations (YAML)
  --scripts-dir <dir>    where compiled artifacts go (default: scripts)
  --db <file>            persist cases and results to this SQLite file
  --mode <m>             distinct | simultaneous (default: distinct)
  --interpreter <bin>    artifact interpreter (default: python3)
  --timeout <secs>       per-process timeout (default: 60)
  --requirement <tag>    requirement tag applied to the batch
  --priority <p>         low | medium | high (default: medium)";

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let Some(rules) = args.next() else {
        bail!("{USAGE}");
    };

    let mut parsed = Args {
        rules: PathBuf::from(rules),
        domains: None,
        scripts_dir: PathBuf::from("scripts"),
        db: None,
        mode: RunMode::Distinct,
        interpreter: "python3".to_string(),
        timeout_secs: 60,
        requirement: None,
        priority: Priority::default(),
    };

    while let Some(flag) = args.next() {
        let mut value = |name: &str| {
            args.next()
                .with_context(|| format!("{name} expects a value"))
        };
        match flag.as_str() {
            "--domains" => parsed.domains = Some(PathBuf::from(value("--domains")?)),
            "--scripts-dir" => parsed.scripts_dir = PathBuf::from(value("--scripts-dir")?),
            "--db" => parsed.db = Some(PathBuf::from(value("--db")?)),
            "--mode" => {
                parsed.mode = match value("--mode")?.as_str() {
                    "distinct" => RunMode::Distinct,
                    "simultaneous" => RunMode::Simultaneous,
                    other => bail!("unknown mode '{other}'"),
                }
            }
            "--interpreter" => parsed.interpreter = value("--interpreter")?,
            "--timeout" => {
                parsed.timeout_secs = value("--timeout")?
                    .parse()
                    .context("--timeout expects seconds")?
            }
            "--requirement" => parsed.requirement = Some(value("--requirement")?),
            "--priority" => {
                parsed.priority = match value("--priority")?.as_str() {
                    "low" => Priority::Low,
                    "medium" => Priority::Medium,
                    "high" => Priority::High,
                    other => bail!("unknown priority '{other}'"),
                }
            }
            other => bail!("unknown flag '{other}'\n{USAGE}"),
        }
    }

    Ok(parsed)
}

fn load_domains(path: Option<&PathBuf>) -> Result<HashMap<String, ValueDomain>> {
    let Some(path) = path else {
        return Ok(HashMap::new());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read domains file {}", path.display()))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse domains file {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = parse_args()?;
    let configs = hat_rule::loader::load_file(&args.rules)?;
    let domains = load_domains(args.domains.as_ref())?;
    let mut store = match &args.db {
        Some(path) => Some(Store::open(path)?),
        None => None,
    };

    let scheduler = Scheduler::new()
        .with_interpreter(&args.interpreter)
        .with_timeout(Duration::from_secs(args.timeout_secs));

    for config in configs {
        let mut automation = Automation::from_config(config);
        if !automation.enabled {
            info!(automation = %automation.id, "skipping disabled automation");
            continue;
        }

        let artifact = match hat_compile::compile_automation(&automation) {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(automation = %automation.id, "compilation failed: {e}");
                automation.set_validation(Some(e.to_string()));
                if let Some(store) = &store {
                    store.upsert_automation(&automation)?;
                }
                continue;
            }
        };
        let script = hat_compile::writer::write_artifact(&args.scripts_dir, &artifact)?;

        let request = CombineRequest {
            automation_id: &automation.id,
            trigger_entities: &artifact.entities.trigger.entities,
            condition_entities: &artifact.entities.condition.entities,
            action_entities: &artifact.entities.action.entities,
            requirement: args.requirement.clone(),
            priority: args.priority,
        };
        let generated = combine(&request, &domains);
        for issue in &generated.issues {
            warn!(automation = %automation.id, "{issue}");
        }
        info!(
            automation = %automation.id,
            cases = generated.cases.len(),
            "generated test cases"
        );

        if let Some(store) = store.as_mut() {
            store.upsert_automation(&automation)?;
            store.save_domains(&automation.id, &domains)?;
            store.save_cases(&generated.cases)?;
        }

        let outcomes = scheduler
            .run(args.mode, &automation, &script, &generated.cases)
            .await;

        let mut tally: HashMap<&'static str, usize> = HashMap::new();
        for outcome in &outcomes {
            let label = match outcome.status {
                hat_core::CaseStatus::Passed => "passed",
                hat_core::CaseStatus::Failed => "failed",
                hat_core::CaseStatus::Error => "error",
                hat_core::CaseStatus::Skipped => "skipped",
                hat_core::CaseStatus::Cancelled => "cancelled",
                hat_core::CaseStatus::Rejected => "rejected",
            };
            *tally.entry(label).or_insert(0) += 1;
            if let Some(detail) = &outcome.detail {
                println!("{}  {}  {}", outcome.case_id, label, detail);
            } else {
                println!("{}  {}", outcome.case_id, label);
            }
        }

        let mut summary: Vec<String> = tally
            .iter()
            .map(|(label, count)| format!("{count} {label}"))
            .collect();
        summary.sort();
        println!(
            "{}: {} cases ({})",
            automation.display_name(),
            outcomes.len(),
            summary.join(", ")
        );

        if let Some(store) = store.as_mut() {
            store.record_results(&outcomes)?;
        }
    }

    Ok(())
}
