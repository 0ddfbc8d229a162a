//! Verify that a secrets file produces a working client
//!
//! Usage:
//!     FBN_SECRETS_PATH=secrets.json cargo run --example verify_connection
//!
//! This script will:
//! 1. Build a client factory from the secrets file (or FBN_* variables)
//! 2. Build an Instruments API client
//! 3. List the identifier types known to the service

use instrument_client::{ApiClientFactory, InstrumentsApi};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let factory = match std::env::var("FBN_SECRETS_PATH") {
        Ok(path) => {
            info!(%path, "using secrets file");
            ApiClientFactory::from_secrets_file(path)?
        }
        Err(_) => {
            warn!("FBN_SECRETS_PATH not set; falling back to FBN_* environment variables");
            ApiClientFactory::from_env()?
        }
    };

    let api: InstrumentsApi = factory.build();
    let identifier_types = api.get_instrument_identifier_types().await?;

    info!(count = identifier_types.values.len(), "identifier types");
    for descriptor in &identifier_types.values {
        info!(
            identifier_type = %descriptor.identifier_type,
            unique = descriptor.is_unique_identifier_type,
            "{}",
            descriptor.property_key
        );
    }

    Ok(())
}
