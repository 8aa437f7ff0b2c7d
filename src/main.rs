use log::{error, info};
use std::sync::Arc;

mod catalog;
mod config;
mod core;
mod db;
mod services;
mod utils;
mod web;

use crate::catalog::catalog;
use crate::config::AppConfig;
use crate::db::SqliteStore;
use crate::services::StorageRegistry;
use crate::web::server::{start_web_server, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    info!("Starting DataSphere...");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Catalog loaded: {} tracks, {} lessons",
        catalog().tracks().len(),
        catalog().total_lessons()
    );

    // Client storage survives restarts only when a directory is configured
    let storage = match &config.storage_dir {
        Some(dir) => StorageRegistry::persistent(dir),
        None => Ok(StorageRegistry::in_memory()),
    }
    .and_then(|storage| storage.with_capacity(config.session_capacity));
    let storage = match storage {
        Ok(storage) => storage,
        Err(e) => {
            error!("Cannot set up session storage: {}", e);
            std::process::exit(1);
        }
    };

    let users = match SqliteStore::open(&config.database_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Cannot open user store {}: {}", config.database_path, e);
            std::process::exit(1);
        }
    };

    let state = match AppState::new(config, storage, users) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialise application state: {}", e);
            std::process::exit(1);
        }
    };

    // Start the web interface; returns on Ctrl+C
    start_web_server(state).await?;

    info!("DataSphere shutdown complete");
    Ok(())
}
