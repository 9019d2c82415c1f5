//! Storage Layer
//!
//! Resolves the per-user data and config directories and persists the
//! component inventory in SQLite.

pub mod database;

use anyhow::{Context, Result};
use std::path::PathBuf;

pub use database::{Component, Container, Database, NewComponent, StockMovement, TypeSummary};

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "partscan", "partscan")
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))
}

/// Get the application data directory, creating it if needed
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = project_dirs()?.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;
    Ok(data_dir)
}

/// Get the configuration directory, creating it if needed
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = project_dirs()?.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory {:?}", config_dir))?;
    Ok(config_dir)
}

/// Default location of the inventory database
pub fn default_database_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("inventory.db"))
}

/// Default location of the configuration file
pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}
