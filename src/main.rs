use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use drcluster::config::Config;
use drcluster::predicate::{Predicate, PredicateBuilder};
use drcluster::provider::{
    CLUSTER_COLO_PROPERTY_ID, CLUSTER_INTERFACES_PROPERTY_ID, CLUSTER_LOCATIONS_PROPERTY_ID,
    CLUSTER_NAME_PROPERTY_ID, CLUSTER_PROPERTIES_PROPERTY_ID,
};
use drcluster::resource::{
    get_key_property_ids, get_property_ids, get_resource_type, PropertyMap, Request, ResourceType,
    REQUEST_ID_INFO_KEY,
};
use drcluster::service::client::IvoryClient;
use drcluster::{ProviderOptions, ResourceProvider, TargetClusterResourceProvider};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Manage disaster-recovery target clusters
#[derive(Parser, Debug)]
#[command(name = "drcluster", version = drcluster::VERSION, about, long_about = None)]
struct Args {
    /// Base URL of the cluster service
    #[arg(long)]
    endpoint: Option<String>,

    /// Bearer token for the cluster service
    #[arg(long)]
    token: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Cluster fetches allowed in flight at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    output: OutputFormat,

    /// Persist --endpoint, --token, --timeout and --concurrency to the config file
    #[arg(long)]
    save_config: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List target clusters
    List {
        /// Filter term `id=value` or `id!=value` (repeatable, AND-ed)
        #[arg(long = "where", value_name = "TERM")]
        terms: Vec<String>,

        /// Only return these property ids
        #[arg(long = "fields", value_name = "ID")]
        fields: Vec<String>,
    },
    /// Create a target cluster
    Create {
        #[arg(long)]
        name: String,

        #[command(flatten)]
        fields: ClusterFields,
    },
    /// Update every target cluster matching the filter
    Update {
        #[arg(long = "where", value_name = "TERM", required = true)]
        terms: Vec<String>,

        #[command(flatten)]
        fields: ClusterFields,
    },
    /// Delete every target cluster matching the filter
    Delete {
        #[arg(long = "where", value_name = "TERM", required = true)]
        terms: Vec<String>,
    },
    /// Print the key property ids
    Keys,
}

#[derive(clap::Args, Debug, Default)]
struct ClusterFields {
    #[arg(long)]
    colo: Option<String>,

    #[arg(long = "interface", value_name = "INTERFACE")]
    interfaces: Vec<String>,

    #[arg(long = "location", value_name = "LOCATION")]
    locations: Vec<String>,

    /// Cluster property `key=value` (repeatable)
    #[arg(long = "property", value_name = "KEY=VALUE")]
    properties: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Cannot open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("drcluster started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("drcluster").join("drcluster.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".drcluster").join("drcluster.log");
    }
    PathBuf::from("drcluster.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    // CLI > config file > environment > default
    let config = Config::load();
    let endpoint = args
        .endpoint
        .clone()
        .unwrap_or_else(|| config.effective_endpoint());
    let token = args.token.clone().or_else(|| config.effective_token());
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.effective_timeout());
    let fetch_concurrency = args
        .concurrency
        .unwrap_or_else(|| config.effective_fetch_concurrency());

    if args.save_config {
        let overrides = Config {
            endpoint: args.endpoint.clone(),
            token: args.token.clone(),
            timeout_secs: args.timeout,
            fetch_concurrency: args.concurrency,
        };
        config.merged(&overrides).save()?;
        tracing::info!("Saved configuration to {:?}", Config::config_path());
    }

    tracing::info!("Using endpoint: {}", endpoint);

    let client = IvoryClient::new(&endpoint, token, timeout)?;
    let resource_type = ResourceType::DrTargetCluster;
    let provider = TargetClusterResourceProvider::new(
        client,
        get_property_ids(resource_type),
        get_key_property_ids(resource_type),
    )
    .with_options(ProviderOptions { fetch_concurrency });

    let request_id = uuid::Uuid::new_v4().to_string();
    let output = run(&provider, args.command, &request_id, args.output).await?;
    println!("{}", output);

    Ok(())
}

async fn run<P: ResourceProvider>(
    provider: &P,
    command: Command,
    request_id: &str,
    format: OutputFormat,
) -> Result<String> {
    let request_info = HashMap::from([(REQUEST_ID_INFO_KEY.to_string(), request_id.to_string())]);

    match command {
        Command::List { terms, fields } => {
            let predicate = parse_where(&terms)?;
            let fields: HashSet<String> = fields.iter().map(|f| qualify(f)).collect();
            let unsupported = provider.check_property_ids(&fields);
            if !unsupported.is_empty() {
                let mut unsupported: Vec<_> = unsupported.into_iter().collect();
                unsupported.sort();
                bail!("Unsupported property ids: {}", unsupported.join(", "));
            }

            let request =
                Request::read(fields).with_request_info(REQUEST_ID_INFO_KEY, request_id);
            let resources = provider
                .get_resources(&request, predicate.as_ref())
                .await
                .context("Failed to list clusters")?;
            render(&resources, format)
        }
        Command::Create { name, fields } => {
            let mut properties = fields.to_properties()?;
            properties.insert(CLUSTER_NAME_PROPERTY_ID.to_string(), Value::String(name));

            let request = Request::create(vec![properties], request_info);
            let created = provider
                .create_resources(&request)
                .await
                .context("Failed to create cluster")?;
            render(&created, format)
        }
        Command::Update { terms, fields } => {
            let predicate = parse_where(&terms)?;
            let delta = fields.to_properties()?;
            if delta.is_empty() {
                bail!("Nothing to update: pass --colo, --interface, --location or --property");
            }

            let request = Request::update(delta, request_info);
            let updated = provider
                .update_resources(&request, predicate.as_ref())
                .await
                .context("Failed to update clusters")?;
            render(&updated, format)
        }
        Command::Delete { terms } => {
            let predicate = parse_where(&terms)?;
            let deleted = provider
                .delete_resources(predicate.as_ref())
                .await
                .context("Failed to delete clusters")?;
            render(&deleted, format)
        }
        Command::Keys => {
            let keys: BTreeMap<_, _> = provider.key_property_ids().clone().into_iter().collect();
            render(&keys, format)
        }
    }
}

impl ClusterFields {
    /// Only the fields given on the command line
    fn to_properties(&self) -> Result<PropertyMap> {
        let mut properties = PropertyMap::new();
        if let Some(colo) = &self.colo {
            properties.insert(CLUSTER_COLO_PROPERTY_ID.to_string(), Value::from(colo.as_str()));
        }
        if !self.interfaces.is_empty() {
            properties.insert(
                CLUSTER_INTERFACES_PROPERTY_ID.to_string(),
                Value::from(self.interfaces.clone()),
            );
        }
        if !self.locations.is_empty() {
            properties.insert(
                CLUSTER_LOCATIONS_PROPERTY_ID.to_string(),
                Value::from(self.locations.clone()),
            );
        }
        for entry in &self.properties {
            let Some((key, value)) = entry.split_once('=') else {
                bail!("Invalid property `{}`, expected KEY=VALUE", entry);
            };
            properties.insert(
                format!("{}/{}", CLUSTER_PROPERTIES_PROPERTY_ID, key.trim()),
                Value::from(value),
            );
        }
        Ok(properties)
    }
}

/// Bare names live under the category of the target-cluster type
fn qualify(property_id: &str) -> String {
    if property_id.contains('/') {
        return property_id.to_string();
    }
    let category = get_resource_type(ResourceType::DrTargetCluster)
        .map_or("Cluster", |def| def.category.as_str());
    format!("{}/{}", category, property_id)
}

/// AND together `id=value` / `id!=value` terms; no terms selects everything
fn parse_where(terms: &[String]) -> Result<Option<Predicate>> {
    if terms.is_empty() {
        return Ok(None);
    }

    let mut builder = PredicateBuilder::new();
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            builder = builder.and();
        }
        builder = if let Some((id, value)) = term.split_once("!=") {
            builder.property(&qualify(id.trim())).not_equals(value)
        } else if let Some((id, value)) = term.split_once('=') {
            builder.property(&qualify(id.trim())).equals(value)
        } else {
            bail!("Invalid filter `{}`, expected ID=VALUE", term);
        };
    }

    let predicate = builder.to_predicate()?;
    tracing::debug!("parsed filter: {}", predicate);
    Ok(Some(predicate))
}

fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    })
}
