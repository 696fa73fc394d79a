//! Dunning tunables location

use serde::Deserialize;
use std::path::PathBuf;

/// Where the hot-reloadable tunables live. Without a path the built-in
/// defaults are used and never change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DunningConfig {
    pub settings_path: Option<PathBuf>,
}
