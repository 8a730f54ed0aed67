//! Impersonated GCP Resource Inventory
//!
//! Exchanges a long-lived service account key for short-lived impersonated
//! credentials, discovers every project the target identity can reach, and
//! aggregates compute, asset, and monitoring data into per-project reports.

pub mod auth;
pub mod config;
pub mod discovery;
pub mod inventory;

pub use auth::{authenticate, AuthError, DelegatedIdentity, ImpersonatedCaller, Principal};
pub use config::Config;
pub use discovery::{list_tenants, DiscoveryError};
pub use inventory::{run_asset_inventory, run_inventory, InventoryRun, TenantReport};
