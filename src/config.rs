//! Service Configuration
//!
//! All runtime options are loaded once at process start, from CLI flags or
//! environment variables. The key file itself is opaque to the rest of the
//! service and only ever read by the credential broker.

use clap::Parser;
use std::path::PathBuf;

use crate::auth::DelegatedIdentity;

/// Default OAuth scope requested for both the source and the impersonated
/// credentials.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// GCP Inventory Server configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "inventory-server")]
#[command(about = "Impersonated GCP resource inventory service", long_about = None)]
#[command(version)]
pub struct Config {
    /// Path to the source service account key file (JSON)
    #[arg(long, env = "INVENTORY_KEY_FILE")]
    pub key_file: PathBuf,

    /// Service account email to impersonate
    #[arg(long, env = "INVENTORY_TARGET_IDENTITY")]
    pub target_identity: String,

    /// Lifetime of the impersonated token in seconds (max 3600)
    #[arg(long, env = "INVENTORY_TOKEN_LIFETIME_SECS", default_value_t = 3600)]
    pub token_lifetime_secs: u64,

    /// OAuth scopes requested for the impersonated token (comma-separated)
    #[arg(
        long,
        env = "INVENTORY_SCOPES",
        value_delimiter = ',',
        default_value = CLOUD_PLATFORM_SCOPE
    )]
    pub scopes: Vec<String>,

    /// Intermediate service accounts in the delegation chain (comma-separated)
    #[arg(long, env = "INVENTORY_DELEGATES", value_delimiter = ',')]
    pub delegates: Vec<String>,

    /// Port to listen on
    #[arg(long, env = "INVENTORY_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Maximum number of tenants collected concurrently
    #[arg(long, env = "INVENTORY_TENANT_CONCURRENCY", default_value_t = 4)]
    pub tenant_concurrency: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// The impersonation target described by this configuration.
    pub fn delegated_identity(&self) -> DelegatedIdentity {
        DelegatedIdentity {
            principal: self.target_identity.clone(),
            scopes: self.scopes.clone(),
            lifetime_secs: self.token_lifetime_secs,
            delegates: self.delegates.clone(),
        }
    }
}
