//! Instrument Master Harness CLI
//!
//! Seeds and removes fixture instruments, inspects the instrument master and
//! ensures property definitions from the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use instrument_client::models::{Property, UpsertInstrumentPropertyRequest};
use instrument_master::config::HarnessConfig;
use instrument_master::fixtures::{self, FixtureContext, FIGI};
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Secrets file; overrides the configured path
    #[arg(short, long)]
    secrets: Option<PathBuf>,

    /// Log level (debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit JSON logs instead of human-readable ones
    #[arg(long)]
    json_logs: bool,

    /// Also write JSON logs to a daily-rolling file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upsert the five fixture instruments
    Seed,
    /// Upsert the walkthrough instruments (FIGI + client-internal ids)
    SeedTutorial {
        /// Suffix appended to client-internal ids
        #[arg(long, conflicts_with = "unique")]
        run_id: Option<String>,
        /// Generate a fresh suffix so parallel runs never share ids
        #[arg(long)]
        unique: bool,
    },
    /// Delete the five fixture instruments
    Purge,
    /// List the identifier types the service knows about
    IdentifierTypes,
    /// List instruments
    List {
        /// Maximum number of instruments; defaults to the configured page size
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Look up instruments by identifier
    Lookup {
        #[arg(long, default_value = FIGI)]
        identifier_type: String,
        #[arg(long = "property-key")]
        property_keys: Vec<String>,
        #[arg(required = true)]
        identifiers: Vec<String>,
    },
    /// Create an instrument property definition unless it already exists
    EnsureProperty {
        #[arg(long)]
        code: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Set a label property on an instrument, creating the definition if needed
    SetProperty {
        #[arg(long, default_value = FIGI)]
        identifier_type: String,
        #[arg(long)]
        identifier: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let _log_guard = init_tracing(&args.log_level, args.json_logs, args.log_dir.as_deref())?;

    let mut config =
        HarnessConfig::load(args.config.as_deref()).context("loading harness configuration")?;
    if let Some(secrets) = args.secrets {
        config.secrets_path = Some(secrets);
    }

    let ctx = FixtureContext::from_config(&config).context("building API clients")?;
    info!(scope = %ctx.scope, "instrument master harness ready");

    match args.command {
        Command::Seed => {
            let ids = ctx.loader().load_instruments().await?;
            for id in ids {
                println!("{id}");
            }
        }
        Command::SeedTutorial { run_id, unique } => {
            let run_id = run_id.or_else(|| unique.then(|| Uuid::new_v4().simple().to_string()));
            let request = fixtures::tutorial_definitions(run_id.as_deref());
            let response = ctx.instruments_api.upsert_instruments(&request).await?;
            for (figi, instrument) in &response.values {
                println!("{figi}\t{}\t{}", instrument.instrument_uid, instrument.name);
            }
            for (figi, failure) in &response.failed {
                eprintln!(
                    "failed {figi}: {}",
                    failure.detail.as_deref().unwrap_or("no detail")
                );
            }
        }
        Command::Purge => {
            ctx.loader().delete_instruments().await?;
        }
        Command::IdentifierTypes => {
            let types = ctx.instruments_api.get_instrument_identifier_types().await?;
            for descriptor in types.values {
                println!(
                    "{}\t{}\tunique={}",
                    descriptor.identifier_type,
                    descriptor.property_key,
                    descriptor.is_unique_identifier_type
                );
            }
        }
        Command::List { limit } => {
            let limit = limit.unwrap_or(config.list_page_size);
            let page = ctx.instruments_api.list_instruments(Some(limit)).await?;
            for instrument in page.values {
                println!("{}\t{}", instrument.instrument_uid, instrument.name);
            }
        }
        Command::Lookup {
            identifier_type,
            property_keys,
            identifiers,
        } => {
            let response = ctx
                .instruments_api
                .get_instruments(&identifier_type, &identifiers, &property_keys)
                .await?;
            println!("{}", serde_json::to_string_pretty(&response.values)?);

            let expected: Vec<&str> = identifiers.iter().map(String::as_str).collect();
            let missing = fixtures::missing_identifiers(&response.values, &expected);
            if !missing.is_empty() {
                anyhow::bail!("not found: {}", missing.join(", "));
            }
        }
        Command::EnsureProperty { code, display_name } => {
            let display_name = display_name.unwrap_or_else(|| code.clone());
            let (key, outcome) = ctx.ensure_instrument_property(&code, &display_name).await?;
            println!("{key}\t{outcome:?}");
        }
        Command::SetProperty {
            identifier_type,
            identifier,
            code,
            value,
        } => {
            let (key, _) = ctx.ensure_instrument_property(&code, &code).await?;
            ctx.instruments_api
                .upsert_instruments_properties(&[UpsertInstrumentPropertyRequest {
                    identifier_type: identifier_type.clone(),
                    identifier: identifier.clone(),
                    properties: vec![Property::label(&key, &value)],
                }])
                .await?;

            let instrument = ctx
                .instruments_api
                .find_instrument(&identifier_type, &identifier, &[key.as_str()])
                .await?
                .found()
                .with_context(|| format!("{identifier_type} {identifier} not found"))?;
            println!(
                "{}\t{}={}",
                instrument.name,
                key,
                instrument.label(&key).unwrap_or("<unset>")
            );
        }
    }

    Ok(())
}

fn init_tracing(
    log_level: &str,
    json: bool,
    log_dir: Option<&std::path::Path>,
) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let level_filter = match log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };
    let filter = || EnvFilter::from_default_env().add_directive(level_filter.into());

    // Logs go to stderr so command output on stdout stays pipeable
    let stderr_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(filter())
            .boxed()
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "instrument-master.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(filter())
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
