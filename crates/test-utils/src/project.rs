#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assetflow::config::{load_and_validate, BuildConfig, DEFAULT_CONFIG_FILE};
use tempfile::TempDir;

/// Builder for an `Assetflow.toml` using the conventional layout:
/// sources under `source/`, outputs under `build/<mode>/`.
pub struct ConfigBuilder {
    index: Vec<String>,
    bundles: Vec<(String, Vec<String>)>,
    browsers: Vec<String>,
    task_deps: Vec<(String, Vec<String>)>,
    lint: Vec<(String, String)>,
    watch_behaviour: Option<String>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            index: Vec::new(),
            bundles: Vec::new(),
            browsers: Vec::new(),
            task_deps: Vec::new(),
            lint: Vec::new(),
            watch_behaviour: None,
        }
    }

    /// Passthrough file, relative to `source/`.
    pub fn index(mut self, file: &str) -> Self {
        self.index.push(file.to_string());
        self
    }

    /// Script bundle; `files` are relative to the project root.
    pub fn bundle(mut self, name: &str, files: &[&str]) -> Self {
        self.bundles.push((
            name.to_string(),
            files.iter().map(|f| f.to_string()).collect(),
        ));
        self
    }

    pub fn browsers(mut self, queries: &[&str]) -> Self {
        self.browsers.extend(queries.iter().map(|q| q.to_string()));
        self
    }

    pub fn task_dep(mut self, task: &str, deps: &[&str]) -> Self {
        self.task_deps.push((
            task.to_string(),
            deps.iter().map(|d| d.to_string()).collect(),
        ));
        self
    }

    /// `rule` in kebab-case, `severity` one of off/warn/error.
    pub fn lint_rule(mut self, rule: &str, severity: &str) -> Self {
        self.lint.push((rule.to_string(), severity.to_string()));
        self
    }

    pub fn triggered_while_running(mut self, behaviour: &str) -> Self {
        self.watch_behaviour = Some(behaviour.to_string());
        self
    }

    pub fn to_toml(&self) -> String {
        let mut out = String::new();

        if !self.browsers.is_empty() {
            out.push_str(&format!("browsers = {}\n\n", toml_list(&self.browsers)));
        }

        out.push_str("[paths]\nsource = \"source\"\n\n");
        out.push_str(
            "[build_paths]\ndevelopment = \"build/development\"\nproduction = \"build/production\"\n\n",
        );

        out.push_str(&format!("[files]\nindex = {}\n\n", toml_list(&self.index)));
        for (name, files) in &self.bundles {
            out.push_str(&format!(
                "[[files.js]]\nname = \"{name}\"\nfiles = {}\n\n",
                toml_list(files)
            ));
        }

        if !self.task_deps.is_empty() {
            out.push_str("[task_deps]\n");
            for (task, deps) in &self.task_deps {
                out.push_str(&format!("{task} = {}\n", toml_list(deps)));
            }
            out.push('\n');
        }

        if !self.lint.is_empty() {
            out.push_str("[lint]\n");
            for (rule, severity) in &self.lint {
                out.push_str(&format!("{rule} = \"{severity}\"\n"));
            }
            out.push('\n');
        }

        if let Some(behaviour) = &self.watch_behaviour {
            out.push_str(&format!(
                "[watch]\ntriggered_while_running_behaviour = \"{behaviour}\"\n"
            ));
        }

        out
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn toml_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|i| format!("\"{i}\"")).collect();
    format!("[{}]", quoted.join(", "))
}

/// A throwaway project directory.
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("creating temp project dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    /// Write `contents` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("creating parent dirs");
        }
        fs::write(&path, contents).expect("writing fixture file");
        path
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel))
            .unwrap_or_else(|e| panic!("reading {rel}: {e}"))
    }

    pub fn read_bytes(&self, rel: &str) -> Vec<u8> {
        fs::read(self.path(rel)).unwrap_or_else(|e| panic!("reading {rel}: {e}"))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.path(rel)).expect("removing fixture file");
    }

    /// Write `Assetflow.toml` and load it back through the real loader.
    pub fn config(&self, builder: &ConfigBuilder) -> BuildConfig {
        let path = self.write(DEFAULT_CONFIG_FILE, builder.to_toml());
        load_and_validate(&path).expect("loading fixture config")
    }

    /// Every file under `rel`, as sorted forward-slash paths relative to it.
    pub fn list(&self, rel: &str) -> Vec<String> {
        let base = self.path(rel);
        let mut files = Vec::new();
        collect_files(&base, &base, &mut files);
        files.sort();
        files
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_files(base: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(base, &path, out);
        } else if let Ok(rel) = path.strip_prefix(base) {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
}
