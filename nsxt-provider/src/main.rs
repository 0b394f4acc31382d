//! nsxt: apply NS service configurations to an NSX-T manager.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use nsxt_provider::{
    Action, Applied, Configuration, Engine, Plan, Provider, ProviderArgs, ProviderConfig,
    ResourceRegistry, StateDocument, validate_configuration,
};
use tabled::{Table, Tabled};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "nsxt", version)]
#[command(about = "Declarative NSX-T NS service management", long_about = None)]
struct Cli {
    /// Configuration document (Terraform JSON syntax)
    #[arg(long, default_value = "main.tf.json", global = true)]
    config: PathBuf,

    /// State document
    #[arg(long, default_value = "terraform.tfstate.json", global = true)]
    state: PathBuf,

    #[command(flatten)]
    provider: ProviderArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the configuration without contacting the manager
    Validate,

    /// Show what apply would change
    Plan,

    /// Converge the manager to the configuration
    Apply,

    /// Destroy every tracked object
    Destroy,

    /// Re-read tracked objects and drop vanished ones
    Refresh,

    /// Start tracking an existing object
    Import {
        /// Resource address, <type>.<name>
        address: String,
        /// Manager-assigned object id
        id: String,
    },

    /// Print the tracked state
    Show,

    /// Describe supported resource types
    Schema {
        /// Resource type (all types when omitted)
        resource_type: Option<String>,
    },

    /// Print tunnel and BFD counters of a transport zone
    ZoneStatus {
        /// Transport zone id
        zone_id: String,
    },
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "ADDRESS")]
    address: String,
    #[tabled(rename = "ACTION")]
    action: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "CHANGED")]
    changed: String,
}

#[derive(Tabled)]
struct AppliedRow {
    #[tabled(rename = "ADDRESS")]
    address: String,
    #[tabled(rename = "RESULT")]
    result: String,
}

impl From<Applied> for AppliedRow {
    fn from(applied: Applied) -> Self {
        Self {
            address: applied.address,
            result: applied.result.to_string(),
        }
    }
}

#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "ADDRESS")]
    address: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "DISPLAY NAME")]
    display_name: String,
    #[tabled(rename = "UPDATED")]
    updated_at: String,
}

#[derive(Tabled)]
struct AttributeRow {
    #[tabled(rename = "ATTRIBUTE")]
    name: String,
    #[tabled(rename = "TYPE")]
    ty: String,
    #[tabled(rename = "PRESENCE")]
    presence: String,
    #[tabled(rename = "ON CHANGE")]
    update: String,
    #[tabled(rename = "DESCRIPTION")]
    description: String,
}

#[derive(Tabled)]
struct CounterRow {
    #[tabled(rename = "COUNTER")]
    name: &'static str,
    #[tabled(rename = "VALUE")]
    value: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nsxt_provider=info,nsxt_sdk=warn,reqwest=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate => {
            let config = Configuration::load(&cli.config).await?;
            let resources = validate_configuration(&ResourceRegistry::new(), &config)?;
            println!("Configuration is valid: {} resource(s)", resources.len());
        }

        Commands::Schema { resource_type } => print_schema(resource_type.as_deref())?,

        Commands::Plan => {
            let config = Configuration::load(&cli.config).await?;
            let provider = connect(cli.provider, Some(&config))?;
            let state = StateDocument::load(&cli.state).await?;
            let plan = Engine::new(&provider).plan(&config, &state).await?;
            print_plan(&plan);
        }

        Commands::Apply => {
            let config = Configuration::load(&cli.config).await?;
            let provider = connect(cli.provider, Some(&config))?;
            let mut state = StateDocument::load(&cli.state).await?;

            let result = Engine::new(&provider).apply(&config, &mut state).await;
            save_state(&state, &cli.state).await?;
            print_applied(result?);
        }

        Commands::Destroy => {
            let config = load_optional(&cli.config).await?;
            let provider = connect(cli.provider, config.as_ref())?;
            let mut state = StateDocument::load(&cli.state).await?;

            let result = Engine::new(&provider).destroy(&mut state).await;
            save_state(&state, &cli.state).await?;
            print_applied(result?);
        }

        Commands::Refresh => {
            let config = load_optional(&cli.config).await?;
            let provider = connect(cli.provider, config.as_ref())?;
            let mut state = StateDocument::load(&cli.state).await?;

            let result = Engine::new(&provider).refresh(&mut state).await;
            save_state(&state, &cli.state).await?;
            print_applied(result?);
        }

        Commands::Import { address, id } => {
            let config = load_optional(&cli.config).await?;
            let provider = connect(cli.provider, config.as_ref())?;
            let mut state = StateDocument::load(&cli.state).await?;

            let desired = Engine::new(&provider)
                .import(&mut state, &address, &id)
                .await?;
            save_state(&state, &cli.state).await?;

            println!("Imported {} ({})", address, id);
            println!("{}", serde_json::to_string_pretty(&desired.to_json())?);
        }

        Commands::Show => {
            let state = StateDocument::load(&cli.state).await?;
            if state.resources.is_empty() {
                println!("No resources tracked");
            } else {
                let rows: Vec<StateRow> = state
                    .resources
                    .iter()
                    .map(|r| StateRow {
                        address: r.address(),
                        id: r.id.clone(),
                        display_name: r
                            .attributes
                            .get("display_name")
                            .and_then(|v| v.as_str())
                            .unwrap_or("-")
                            .to_string(),
                        updated_at: r.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    })
                    .collect();
                println!("{}", Table::new(rows));
                println!("serial {} lineage {}", state.serial, state.lineage);
            }
        }

        Commands::ZoneStatus { zone_id } => {
            let config = load_optional(&cli.config).await?;
            let provider = connect(cli.provider, config.as_ref())?;
            let status = provider.transport_zone_status(&zone_id).await?;
            let tunnels = &status.tunnel_status;
            let bfd = &tunnels.bfd_status;

            println!("Transport zone: {}", status.transport_zone_id);
            println!("Nodes:          {}", status.num_transport_nodes);
            println!("Status:         {}", tunnels.status.as_deref().unwrap_or("-"));
            let rows = vec![
                CounterRow { name: "tunnels up", value: tunnels.up_count.into() },
                CounterRow { name: "tunnels down", value: tunnels.down_count.into() },
                CounterRow { name: "bfd up", value: bfd.bfd_up_count.into() },
                CounterRow { name: "bfd down", value: bfd.bfd_down_count.into() },
                CounterRow { name: "bfd init", value: bfd.bfd_init_count.into() },
                CounterRow { name: "bfd admin down", value: bfd.bfd_admin_down_count.into() },
            ];
            println!("{}", Table::new(rows));
        }
    }

    Ok(())
}

/// Build a provider; command line and environment win over the file.
fn connect(args: ProviderArgs, config: Option<&Configuration>) -> Result<Provider> {
    let from_file = config.map(|c| c.provider.clone()).unwrap_or_default();
    let merged = ProviderConfig::from(args).merge(from_file);
    Provider::from_config(&merged).context("configuring provider")
}

async fn load_optional(path: &Path) -> Result<Option<Configuration>> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(None);
    }
    Ok(Some(Configuration::load(path).await?))
}

async fn save_state(state: &StateDocument, path: &Path) -> Result<()> {
    if let Err(e) = state.save(path).await {
        error!(path = %path.display(), error = %e, "Failed to write state");
        bail!(e);
    }
    info!(path = %path.display(), serial = state.serial, "State written");
    Ok(())
}

fn print_plan(plan: &Plan) {
    let rows: Vec<PlanRow> = plan
        .changes
        .iter()
        .map(|c| PlanRow {
            address: c.address.clone(),
            action: c.action.to_string(),
            id: c.id.clone().unwrap_or_else(|| "-".to_string()),
            changed: c.changed.join(", "),
        })
        .collect();
    if !rows.is_empty() {
        println!("{}", Table::new(rows));
    }

    if plan.is_empty() {
        println!("No changes. Infrastructure matches the configuration.");
    } else {
        println!(
            "Plan: {} to create, {} to update, {} to replace, {} to destroy.",
            plan.count(Action::Create),
            plan.count(Action::Update),
            plan.count(Action::Replace),
            plan.count(Action::Delete)
        );
    }
}

fn print_applied(applied: Vec<Applied>) {
    if applied.is_empty() {
        println!("Nothing to do");
        return;
    }
    let rows: Vec<AppliedRow> = applied.into_iter().map(AppliedRow::from).collect();
    println!("{}", Table::new(rows));
}

fn print_schema(resource_type: Option<&str>) -> Result<()> {
    let registry = ResourceRegistry::new();
    let types: Vec<&str> = match resource_type {
        Some(resource_type) => vec![registry.get(resource_type)?.type_name()],
        None => registry.types().collect(),
    };

    for type_name in types {
        let spec = registry.get(type_name)?.spec();
        println!("{}: {}", spec.type_name(), spec.description());
        let rows: Vec<AttributeRow> = spec
            .attributes()
            .iter()
            .map(|a| AttributeRow {
                name: a.name.to_string(),
                ty: a.ty.to_string(),
                presence: if a.required { "required" } else { "optional" }.to_string(),
                update: format!("{:?}", a.update).to_lowercase(),
                description: a.description.to_string(),
            })
            .collect();
        println!("{}\n", Table::new(rows));
    }
    Ok(())
}
