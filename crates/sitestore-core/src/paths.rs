use directories::ProjectDirs;
use std::path::PathBuf;

use crate::error::{Result, StoreError};

pub const APP_QUALIFIER: &str = "com";
pub const APP_ORG: &str = "darklock";
pub const APP_NAME: &str = "sitestore";

pub fn data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .ok_or_else(|| StoreError::Options("cannot determine data directory".into()))?;
    Ok(dirs.data_dir().to_path_buf())
}

/// Default store directory, overridable with `SITESTORE_DIR`.
pub fn default_store_dir() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var("SITESTORE_DIR") {
        return Ok(PathBuf::from(override_path));
    }
    Ok(data_dir()?.join("store"))
}

pub fn default_options_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("store.json"))
}
