//! # Instrument Master Harness
//!
//! Fixture helpers and integration scenarios for the instrument master
//! service, built on the `instrument-client` crate.
//!
//! ## Layout
//!
//! - `instrument-client`: typed client, credentials, client factory and the
//!   idempotent property-definition ensure helper
//! - `config`: harness settings (secrets path, tutorial scope)
//! - `fixtures`: fixture instruments, [`fixtures::InstrumentLoader`] and the
//!   per-suite [`fixtures::FixtureContext`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use instrument_master::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HarnessConfig::load(None)?;
//!     let ctx = FixtureContext::from_config(&config)?;
//!
//!     let ids = ctx.loader().load_instruments().await?;
//!     println!("seeded {} instruments", ids.len());
//!
//!     let (key, _) = ctx.ensure_instrument_property("CustomSector", "Custom Sector").await?;
//!     println!("property {key} ready");
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod fixtures;

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::HarnessConfig;
    pub use crate::fixtures::{FixtureContext, FixtureError, InstrumentLoader};
    pub use instrument_client::{
        ApiClientFactory, ApiError, EnsureOutcome, InstrumentsApi, PropertyDefinitionsApi,
    };
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
