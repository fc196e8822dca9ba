// src/config/model.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::ConfigError;
use crate::engine::TriggerWhileRunningBehaviour;
use crate::tasks::lint::LintConfig;

/// Image extensions picked up by the `images` group.
pub const IMAGE_EXTENSIONS: &str = "{jpg,gif,png,svg}";
/// Video extensions picked up by the `videos` group.
pub const VIDEO_EXTENSIONS: &str = "{mp4,webm}";
/// Stylesheet extensions watched by the `styles` group.
pub const STYLE_EXTENSIONS: &str = "{scss,sass,css}";

/// Names of the built-in asset groups (and of the tasks built from them).
pub const GROUP_IMAGES: &str = "images";
pub const GROUP_VIDEOS: &str = "videos";
pub const GROUP_INDEX: &str = "index";
pub const GROUP_SCRIPTS: &str = "scripts";
pub const GROUP_STYLES: &str = "styles";

/// Build mode, selected once per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    pub fn from_flag(production: bool) -> Self {
        if production {
            Mode::Production
        } else {
            Mode::Development
        }
    }

    pub fn is_production(self) -> bool {
        self == Mode::Production
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Development => f.write_str("development"),
            Mode::Production => f.write_str("production"),
        }
    }
}

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// browsers = ["last 2 versions", "> 1%"]
///
/// [paths]
/// source = "source"
/// assets = "assets"
/// images = "images"
/// videos = "videos"
/// scripts = "scripts"
/// styles = "styles"
///
/// [build_paths]
/// development = "build/development"
/// production = "build/production"
///
/// [files]
/// index = ["index.html"]
///
/// [[files.js]]
/// name = "main.js"
/// files = ["source/assets/scripts/main.js"]
///
/// [server]
/// host = "localhost"
/// port = 8000
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    pub paths: PathsSection,
    pub build_paths: BuildPathsSection,
    #[serde(default)]
    pub files: FilesSection,
    #[serde(default)]
    pub browsers: Vec<String>,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub lint: LintConfig,
    /// Extra ordering edges: `scripts = ["styles"]` makes `scripts` wait for
    /// `styles`.
    #[serde(default)]
    pub task_deps: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub watch: WatchSection,
}

/// `[paths]` section. Every entry is relative to its parent: `assets` lives
/// under `source`, `images` under `assets`, and so on.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    pub source: PathBuf,
    #[serde(default = "default_assets")]
    pub assets: PathBuf,
    #[serde(default = "default_images")]
    pub images: PathBuf,
    #[serde(default = "default_videos")]
    pub videos: PathBuf,
    #[serde(default = "default_scripts")]
    pub scripts: PathBuf,
    #[serde(default = "default_styles")]
    pub styles: PathBuf,
}

fn default_assets() -> PathBuf {
    PathBuf::from("assets")
}

fn default_images() -> PathBuf {
    PathBuf::from("images")
}

fn default_videos() -> PathBuf {
    PathBuf::from("videos")
}

fn default_scripts() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_styles() -> PathBuf {
    PathBuf::from("styles")
}

/// `[build_paths]` section: output roots per mode.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildPathsSection {
    pub development: PathBuf,
    pub production: PathBuf,
}

impl BuildPathsSection {
    pub fn for_mode(&self, mode: Mode) -> &Path {
        match mode {
            Mode::Development => &self.development,
            Mode::Production => &self.production,
        }
    }
}

/// `[files]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesSection {
    /// Passthrough files, relative to `paths.source`.
    #[serde(default)]
    pub index: Vec<String>,

    /// Script bundles, in the order they are declared.
    #[serde(default)]
    pub js: Vec<ScriptBundle>,

    /// Entry stylesheet, relative to the styles directory.
    #[serde(default = "default_styles_entry")]
    pub styles_entry: String,
}

fn default_styles_entry() -> String {
    "index.scss".to_string()
}

impl Default for FilesSection {
    fn default() -> Self {
        Self {
            index: Vec::new(),
            js: Vec::new(),
            styles_entry: default_styles_entry(),
        }
    }
}

/// One `[[files.js]]` entry: the bundle file name and its sources, in
/// concatenation order. Source paths are relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptBundle {
    pub name: String,
    pub files: Vec<String>,
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

/// `[watch]` section: what happens when files change while a run is active.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    #[serde(default)]
    pub triggered_while_running_behaviour: TriggerWhileRunningBehaviour,

    /// Maximum number of queued runs to remember.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,
}

fn default_queue_length() -> usize {
    1
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            triggered_while_running_behaviour: TriggerWhileRunningBehaviour::default(),
            queue_length: default_queue_length(),
        }
    }
}

/// A named collection of source globs and the directory (relative to the
/// output root) its files land in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetGroup {
    pub globs: Vec<String>,
    pub output: PathBuf,
}

/// Validated, immutable build configuration.
///
/// Built once from a [`RawConfigFile`] via `TryFrom` (which runs
/// [`crate::config::validate_config`]) and shared as `Arc<BuildConfig>`.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory every relative path and glob is resolved against.
    pub project_root: PathBuf,
    pub paths: PathsSection,
    pub build_paths: BuildPathsSection,
    pub files: FilesSection,
    pub browsers: Vec<String>,
    pub server: ServerSettings,
    pub lint: LintConfig,
    pub task_deps: BTreeMap<String, Vec<String>>,
    pub watch: WatchSection,
    pub(crate) asset_groups: BTreeMap<String, AssetGroup>,
}

impl BuildConfig {
    /// Build and validate a config whose relative paths resolve against
    /// `project_root`.
    pub fn from_raw(raw: RawConfigFile, project_root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut cfg = BuildConfig {
            project_root: project_root.into(),
            asset_groups: BTreeMap::new(),
            paths: raw.paths,
            build_paths: raw.build_paths,
            files: raw.files,
            browsers: raw.browsers,
            server: raw.server,
            lint: raw.lint,
            task_deps: raw.task_deps,
            watch: raw.watch,
        };
        cfg.asset_groups = cfg.derive_asset_groups();
        crate::config::validate::validate_config(&cfg)?;
        Ok(cfg)
    }

    /// `<source>/<assets>` relative to the project root.
    pub fn assets_source_dir(&self) -> PathBuf {
        self.paths.source.join(&self.paths.assets)
    }

    /// Directory holding the stylesheets, relative to the project root.
    pub fn styles_source_dir(&self) -> PathBuf {
        self.assets_source_dir().join(&self.paths.styles)
    }

    /// Entry stylesheet, relative to the project root.
    pub fn styles_entry(&self) -> PathBuf {
        self.styles_source_dir().join(&self.files.styles_entry)
    }

    /// Absolute (project-rooted) output root for `mode`.
    pub fn output_root(&self, mode: Mode) -> PathBuf {
        self.project_root.join(self.build_paths.for_mode(mode))
    }

    pub fn asset_group(&self, group: &str) -> Result<&AssetGroup, ConfigError> {
        self.asset_groups
            .get(group)
            .ok_or_else(|| ConfigError::UnknownGroup(group.to_string()))
    }

    /// Output directory of an asset group for the given mode.
    pub fn resolve_output_path(&self, group: &str, mode: Mode) -> Result<PathBuf, ConfigError> {
        let group = self.asset_group(group)?;
        Ok(self.output_root(mode).join(&group.output))
    }

    /// Source globs of an asset group, relative to the project root.
    pub fn resolve_source_globs(&self, group: &str) -> Result<Vec<String>, ConfigError> {
        Ok(self.asset_group(group)?.globs.clone())
    }

    pub fn script_bundles(&self) -> &[ScriptBundle] {
        &self.files.js
    }

    fn derive_asset_groups(&self) -> BTreeMap<String, AssetGroup> {
        let assets_out = self.paths.assets.clone();
        let mut groups = BTreeMap::new();

        groups.insert(
            GROUP_IMAGES.to_string(),
            AssetGroup {
                globs: vec![glob_under(
                    &self.assets_source_dir().join(&self.paths.images),
                    &format!("**/*.{IMAGE_EXTENSIONS}"),
                )],
                output: assets_out.join(&self.paths.images),
            },
        );

        groups.insert(
            GROUP_VIDEOS.to_string(),
            AssetGroup {
                globs: vec![glob_under(
                    &self.assets_source_dir().join(&self.paths.videos),
                    &format!("**/*.{VIDEO_EXTENSIONS}"),
                )],
                output: assets_out.join(&self.paths.videos),
            },
        );

        groups.insert(
            GROUP_INDEX.to_string(),
            AssetGroup {
                globs: self
                    .files
                    .index
                    .iter()
                    .map(|file| glob_under(&self.paths.source, file))
                    .collect(),
                output: PathBuf::new(),
            },
        );

        groups.insert(
            GROUP_SCRIPTS.to_string(),
            AssetGroup {
                globs: self
                    .files
                    .js
                    .iter()
                    .flat_map(|bundle| bundle.files.iter().cloned())
                    .collect(),
                output: assets_out.join(&self.paths.scripts),
            },
        );

        groups.insert(
            GROUP_STYLES.to_string(),
            AssetGroup {
                globs: vec![glob_under(
                    &self.styles_source_dir(),
                    &format!("**/*.{STYLE_EXTENSIONS}"),
                )],
                output: assets_out.join(&self.paths.styles),
            },
        );

        groups
    }
}

/// Join a directory and a glob suffix using forward slashes, so patterns look
/// the same on every host.
fn glob_under(dir: &Path, suffix: &str) -> String {
    let dir = dir.to_string_lossy().replace('\\', "/");
    let dir = dir.trim_end_matches('/');
    let suffix = suffix.trim_start_matches("./");
    if dir.is_empty() || dir == "." {
        suffix.to_string()
    } else {
        format!("{dir}/{suffix}")
    }
}

impl TryFrom<RawConfigFile> for BuildConfig {
    type Error = ConfigError;

    /// Resolve against the current working directory.
    fn try_from(raw: RawConfigFile) -> Result<Self, Self::Error> {
        BuildConfig::from_raw(raw, PathBuf::from("."))
    }
}
