use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qeapp_api::QeAppClient;
use qeapp_engine::bridge::to_canonical;
use qeapp_engine::{QeBackend, Wizard, WizardCommand, WizardSnapshot, parse_layout_file, standard_layout};
use qeapp_types::WizardLayout;
use qeapp_util::{WizardConfig, load_config, load_config_from_path};
use serde_json::Value;
use tracing::{Level, info};

#[derive(Parser, Debug)]
#[command(name = "qeapp", version, about = "Configure and inspect Quantum ESPRESSO app jobs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the canonical output structure of a job
    Structure {
        job_id: String,
    },

    /// Inspect or delete submitted jobs
    Jobs {
        #[command(subcommand)]
        command: JobsCommands,
    },

    /// List the codes registered on the backend
    Codes,

    /// Query supported XPS core levels for a structure
    XpsSupport {
        /// Use the output structure of this job
        #[arg(long, conflicts_with = "file")]
        job: Option<String>,

        /// Read the structure from a JSON file
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Render the wizard as JSON, optionally applying commands first
    Wizard {
        /// Layout file replacing the built-in steps
        #[arg(long)]
        layout: Option<PathBuf>,

        /// Snapshot to resume from and save to
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Resume from the steps data stored with a submitted job
        #[arg(long, conflicts_with = "snapshot")]
        from_job: Option<String>,

        /// JSON file holding a list of wizard commands to apply
        #[arg(long)]
        commands: Option<PathBuf>,

        /// Milliseconds to wait for backend lookups before the final render
        #[arg(long, default_value_t = 0)]
        wait_ms: u64,
    },
}

#[derive(Subcommand, Debug)]
enum JobsCommands {
    /// List jobs, newest first
    List,

    /// Delete a job and its provenance
    Delete {
        job_id: String,

        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config_from_path(path)?,
        None => load_config()?,
    };
    let client = QeAppClient::new(&config.api_base_url, config.request_timeout())
        .with_context(|| format!("invalid backend URL in configuration: {}", config.api_base_url))?;

    match cli.command {
        Commands::Structure { job_id } => {
            let job = client.job_data(&job_id).await?;
            let structure = job
                .structure
                .with_context(|| format!("job {job_id} has no output structure"))?;
            print_json(&to_canonical(&structure)?)
        }
        Commands::Jobs { command } => run_jobs(&client, command).await,
        Commands::Codes => {
            for code in client.list_codes().await? {
                match code.display_label() {
                    Some(label) => println!("{label}"),
                    None => println!("{}", serde_json::to_string(&code)?),
                }
            }
            Ok(())
        }
        Commands::XpsSupport { job, file } => {
            let structure = match (job, file) {
                (Some(job_id), _) => client
                    .job_data(&job_id)
                    .await?
                    .structure
                    .with_context(|| format!("job {job_id} has no output structure"))?,
                (None, Some(path)) => read_json_file(&path)?,
                (None, None) => anyhow::bail!("pass either --job or --file"),
            };
            print_json(&client.supported_xps_core_levels(&structure).await?)
        }
        Commands::Wizard {
            layout,
            snapshot,
            from_job,
            commands,
            wait_ms,
        } => {
            let options = WizardOptions {
                layout,
                snapshot,
                from_job,
                commands,
                wait: Duration::from_millis(wait_ms),
            };
            run_wizard(&config, client, options).await
        }
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run_jobs(client: &QeAppClient, command: JobsCommands) -> Result<()> {
    match command {
        JobsCommands::List => {
            let page = client.list_jobs().await?;
            for job in &page.jobs {
                let created = job
                    .created_at()
                    .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{:>6}  {:<16}  {:<10}  {}",
                    job.id,
                    created,
                    job.process_state.as_deref().unwrap_or("-"),
                    job.label.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }
        JobsCommands::Delete { job_id, dry_run } => {
            let outcome = client.delete_job(&job_id, dry_run).await?;
            info!(deleted = outcome.deleted, nodes = outcome.deleted_nodes.len(), "delete finished");
            println!("{}", outcome.message);
            Ok(())
        }
    }
}

struct WizardOptions {
    layout: Option<PathBuf>,
    snapshot: Option<PathBuf>,
    from_job: Option<String>,
    commands: Option<PathBuf>,
    wait: Duration,
}

async fn run_wizard(config: &WizardConfig, client: QeAppClient, options: WizardOptions) -> Result<()> {
    let layout = load_layout(config, options.layout.as_deref())?;
    let backend: Arc<dyn QeBackend> = Arc::new(client.clone());
    let mut wizard = Wizard::new(layout, backend, config.request_timeout());

    let snapshot_path = options.snapshot.or_else(|| config.snapshot_path());
    if let Some(job_id) = &options.from_job {
        let job = client.job_data(job_id).await?;
        let snapshot = WizardSnapshot::from_job_data(&job)?
            .with_context(|| format!("job {job_id} has no saved wizard steps"))?;
        wizard.restore(&snapshot)?;
    } else if let Some(path) = &snapshot_path
        && let Some(snapshot) = WizardSnapshot::load(path)?
    {
        wizard.restore(&snapshot)?;
    }

    if let Some(path) = &options.commands {
        let commands: Vec<WizardCommand> = serde_json::from_value(read_json_file(path)?)
            .with_context(|| format!("{} is not a list of wizard commands", path.display()))?;
        for command in commands {
            wizard
                .apply(command.clone())
                .with_context(|| format!("rejected wizard command {command:?}"))?;
        }
    }

    // The first render starts any lookups; the second picks up their results.
    wizard.render()?;
    if !options.wait.is_zero() {
        tokio::time::sleep(options.wait).await;
    }
    let view = wizard.render()?;
    print_json(&view)?;

    if let Some(path) = &snapshot_path {
        wizard.snapshot().save(path)?;
        info!(path = %path.display(), "wizard snapshot saved");
    }
    Ok(())
}

fn load_layout(config: &WizardConfig, explicit: Option<&Path>) -> Result<WizardLayout> {
    match explicit.map(Path::to_path_buf).or_else(|| config.layout_path()) {
        Some(path) => parse_layout_file(&path),
        None => Ok(standard_layout(&config.codes)),
    }
}

fn read_json_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
