// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs`: the TOML-backed raw model and the validated [`BuildConfig`].
//! - `loader.rs`: reads a config file from disk.
//! - `validate.rs`: semantic checks (paths, bundles, browsers, task graph).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, load_and_validate, load_from_path, DEFAULT_CONFIG_FILE};
pub use model::{
    AssetGroup, BuildConfig, BuildPathsSection, FilesSection, Mode, PathsSection,
    RawConfigFile, ScriptBundle, ServerSettings, WatchSection, GROUP_IMAGES, GROUP_INDEX,
    GROUP_SCRIPTS, GROUP_STYLES, GROUP_VIDEOS,
};
pub use validate::validate_config;
