use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use cli_core::{init_tracing, print_output, GlobalArgs};
use orchestrator::{EntityResult, ProgressSink, RunConfig, TargetCloud};
use storage::{Role, RoleCredentials};

#[derive(Debug, Parser)]
#[command(name = "cda-sync")]
#[command(about = "Synthesises a Delta Lake transaction log over shallow-cloned CDA exports", long_about = None)]
struct Cli {
    #[command(flatten)]
    globals: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Read a manifest and synthesise (or continue) the Delta log for
    /// every admitted entity.
    Run {
        #[arg(long)]
        manifest_uri: String,

        /// Restrict the run to these table names; repeatable. Unset
        /// means every entity in the manifest.
        #[arg(long = "table")]
        table: Vec<String>,

        /// Target Delta table root, e.g. `s3://bucket/delta/{table}`.
        /// `{table}` is substituted per entity; if absent the table
        /// name is appended as a path segment.
        #[arg(long)]
        target: String,

        #[arg(long, default_value_t = 100)]
        checkpoint_interval: u32,

        #[arg(long)]
        max_workers: Option<usize>,

        #[arg(long, action = ArgAction::SetTrue, default_value_t = true)]
        parallel: bool,

        #[arg(long = "no-parallel", action = ArgAction::SetTrue, conflicts_with = "parallel")]
        no_parallel: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.globals.quiet, cli.globals.json)?;

    match cli.command {
        Commands::Run {
            manifest_uri,
            table,
            target,
            checkpoint_interval,
            max_workers,
            parallel,
            no_parallel,
        } => {
            cmd_run(
                &cli.globals,
                manifest_uri,
                table,
                target,
                checkpoint_interval,
                max_workers,
                parallel && !no_parallel,
            )
            .await?
        }
    }
    Ok(())
}

async fn cmd_run(
    glob: &GlobalArgs,
    manifest_uri: String,
    table: Vec<String>,
    target: String,
    checkpoint_interval: u32,
    max_workers: Option<usize>,
    parallel: bool,
) -> Result<()> {
    let table_names = if table.is_empty() { None } else { Some(table.into_iter().collect::<HashSet<_>>()) };

    let mut config = RunConfig {
        manifest_uri,
        table_names,
        target_cloud: TargetCloud::Aws,
        target_table_root: target,
        checkpoint_interval,
        parallel,
        source_credentials: role_credentials(Role::Source, glob),
        target_credentials: role_credentials(Role::Target, glob),
        ..RunConfig::default()
    };
    if let Some(n) = max_workers {
        config.max_workers = n.max(1);
    }
    if let Some(d) = glob.timeout_duration() {
        config.request_timeout = d;
    }

    let progress: Arc<dyn ProgressSink> = if glob.progress && !glob.quiet && !glob.json {
        Arc::new(CliProgressSink::new())
    } else {
        Arc::new(orchestrator::NoopProgressSink)
    };

    let results = orchestrator::run(&config, progress).await?;

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    if glob.json {
        print_output(true, &RunOutput::from(&results))?;
    } else {
        render_human(&results);
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// `--profile`/`--role-arn`/`--region` override the corresponding
/// generic `CDA_*` environment variable for this run, for whichever
/// role is being resolved; role-prefixed env vars (`CDA_SOURCE_*`,
/// `CDA_TARGET_*`) still take precedence over both, matching
/// `storage::credentials`'s documented fallback order.
fn role_credentials(role: Role, glob: &GlobalArgs) -> RoleCredentials {
    let mut creds = RoleCredentials::resolve(role);
    if creds.get("PROFILE").is_none() {
        if let Some(profile) = &glob.profile {
            creds.values.insert("PROFILE".to_string(), profile.clone());
        }
    }
    if creds.get("ROLE_ARN").is_none() {
        if let Some(role_arn) = &glob.role_arn {
            creds.values.insert("ROLE_ARN".to_string(), role_arn.clone());
        }
    }
    if creds.get("REGION").is_none() {
        if let Some(region) = &glob.region {
            creds.values.insert("REGION".to_string(), region.clone());
        }
    }
    creds
}

#[derive(Debug, Serialize)]
struct RunOutput {
    entities: usize,
    failed: usize,
    results: Vec<EntityOutput>,
}

#[derive(Debug, Serialize)]
struct EntityOutput {
    table_name: String,
    committed_versions: Vec<i64>,
    warnings: Vec<String>,
    error: Option<String>,
}

impl From<&Vec<EntityResult>> for RunOutput {
    fn from(results: &Vec<EntityResult>) -> Self {
        let failed = results.iter().filter(|r| r.error.is_some()).count();
        Self {
            entities: results.len(),
            failed,
            results: results
                .iter()
                .map(|r| EntityOutput {
                    table_name: r.table_name.clone(),
                    committed_versions: r.committed_versions.clone(),
                    warnings: r.warnings.clone(),
                    error: r.error.clone(),
                })
                .collect(),
        }
    }
}

fn render_human(results: &[EntityResult]) {
    for r in results {
        match &r.error {
            Some(e) => println!("{}: FAILED ({e})", r.table_name),
            None => println!(
                "{}: ok, {} commit(s){}",
                r.table_name,
                r.committed_versions.len(),
                if r.warnings.is_empty() { String::new() } else { format!(", {} warning(s)", r.warnings.len()) }
            ),
        }
        for w in &r.warnings {
            println!("  warning: {w}");
        }
    }
}

/// Aggregate spinner over the whole run: one line per entity as it
/// finishes, driven by the same `indicatif` style `cli_core::pb_spinner`
/// uses elsewhere in the workspace.
struct CliProgressSink {
    bar: ProgressBar,
}

impl CliProgressSink {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} [{pos}/{len}] {msg}")
                .unwrap()
                .tick_strings(&["⠁", "⠂", "⠄", "⡀", "⢀", "⠠", "⠐", "⠈"]),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }
}

impl ProgressSink for CliProgressSink {
    fn start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn advance(&self, table: &str, _n: u64) {
        self.bar.set_message(format!("{table}: committing"));
    }

    fn finish(&self, table: &str, ok: bool) {
        self.bar.inc(1);
        self.bar.set_message(format!("{table}: {}", if ok { "done" } else { "failed" }));
        if self.bar.position() >= self.bar.length().unwrap_or(0) {
            self.bar.finish_and_clear();
        }
    }
}
