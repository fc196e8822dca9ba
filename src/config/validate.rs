// src/config/validate.rs

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use lightningcss::targets::Browsers;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{BuildConfig, Mode};
use crate::errors::ConfigError;
use crate::tasks::STANDARD_TASKS;

/// Run semantic validation against a loaded configuration.
///
/// This checks:
/// - `paths.source` and both build paths are set
/// - output roots are neither the project root nor overlapping the source tree
/// - every `[[files.js]]` bundle has a unique, non-empty name and files
/// - `browsers` parses as a browserslist query
/// - `[task_deps]` refer to known tasks, without self-references or cycles
/// - `[watch].queue_length >= 1` and `[server].port != 0`
pub fn validate_config(cfg: &BuildConfig) -> Result<(), ConfigError> {
    validate_paths(cfg)?;
    validate_script_bundles(cfg)?;
    validate_browsers(cfg)?;
    validate_task_deps(cfg)?;
    validate_runtime_settings(cfg)?;
    Ok(())
}

fn validate_paths(cfg: &BuildConfig) -> Result<(), ConfigError> {
    if is_blank(&cfg.paths.source) {
        return Err(ConfigError::MissingKey("paths.source".into()));
    }

    let source = normalize(&cfg.paths.source);

    for mode in [Mode::Development, Mode::Production] {
        let key = format!("build_paths.{mode}");
        let out = cfg.build_paths.for_mode(mode);
        if is_blank(out) {
            return Err(ConfigError::MissingKey(key));
        }

        let out = normalize(out);
        if out.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "{key} must not be the project root (it is wiped by `clean`)"
            )));
        }
        if out.starts_with(&source) || source.starts_with(&out) {
            return Err(ConfigError::Invalid(format!(
                "{key} ({}) overlaps paths.source ({})",
                out.display(),
                source.display()
            )));
        }
    }

    Ok(())
}

fn validate_script_bundles(cfg: &BuildConfig) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for bundle in cfg.script_bundles() {
        let name = bundle.name.trim();
        if name.is_empty() {
            return Err(ConfigError::MissingKey("files.js[].name".into()));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(ConfigError::Invalid(format!(
                "script bundle name '{name}' must be a plain file name"
            )));
        }
        if !seen.insert(name.to_string()) {
            return Err(ConfigError::Invalid(format!(
                "script bundle '{name}' is declared more than once"
            )));
        }
        if bundle.files.is_empty() {
            return Err(ConfigError::MissingKey(format!("files.js[{name}].files")));
        }
    }

    Ok(())
}

fn validate_browsers(cfg: &BuildConfig) -> Result<(), ConfigError> {
    if cfg.browsers.is_empty() {
        return Ok(());
    }

    Browsers::from_browserslist(cfg.browsers.iter().map(String::as_str))
        .map(|_| ())
        .map_err(|e| ConfigError::Invalid(format!("invalid browsers query: {e}")))
}

fn validate_task_deps(cfg: &BuildConfig) -> Result<(), ConfigError> {
    let known: HashSet<&str> = STANDARD_TASKS.iter().copied().collect();

    for (name, deps) in cfg.task_deps.iter() {
        if !known.contains(name.as_str()) {
            return Err(ConfigError::UnknownTask(name.clone()));
        }
        for dep in deps {
            if !known.contains(dep.as_str()) {
                return Err(ConfigError::UnknownTask(dep.clone()));
            }
            if dep == name {
                return Err(ConfigError::Invalid(format!(
                    "task '{name}' cannot depend on itself in [task_deps]"
                )));
            }
        }
    }

    // Edge direction: dep -> task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for name in STANDARD_TASKS {
        graph.add_node(name);
    }
    for (name, deps) in cfg.task_deps.iter() {
        for dep in deps {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(ConfigError::Cycle(cycle.node_id().to_string())),
    }
}

fn validate_runtime_settings(cfg: &BuildConfig) -> Result<(), ConfigError> {
    if cfg.watch.queue_length == 0 {
        return Err(ConfigError::Invalid(
            "[watch].queue_length must be >= 1 (got 0)".into(),
        ));
    }
    if cfg.server.port == 0 {
        return Err(ConfigError::Invalid("[server].port must be non-zero".into()));
    }
    Ok(())
}

fn is_blank(path: &Path) -> bool {
    path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty()
}

/// Lexically normalize a relative path (`./a/../b/` → `b`).
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::RawConfigFile;

    fn parse(extra: &str) -> Result<BuildConfig, ConfigError> {
        let text = format!(
            r#"
            [paths]
            source = "source"

            [build_paths]
            development = "build/dev"
            production = "build/prod"

            {extra}
            "#
        );
        let raw: RawConfigFile = toml::from_str(&text)?;
        BuildConfig::from_raw(raw, ".")
    }

    #[test]
    fn minimal_config_is_valid() {
        assert!(parse("").is_ok());
    }

    #[test]
    fn build_path_inside_source_is_rejected() {
        let text = r#"
            [paths]
            source = "source"

            [build_paths]
            development = "./source/dist"
            production = "build/prod"
        "#;
        let raw: RawConfigFile = toml::from_str(text).unwrap();
        let err = BuildConfig::from_raw(raw, ".").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("overlaps")));
    }

    #[test]
    fn duplicate_bundle_names_are_rejected() {
        let err = parse(
            r#"
            [[files.js]]
            name = "app.js"
            files = ["a.js"]

            [[files.js]]
            name = "app.js"
            files = ["b.js"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn empty_bundle_is_a_missing_key() {
        let err = parse(
            r#"
            [[files.js]]
            name = "app.js"
            files = []
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(key) if key.contains("app.js")));
    }

    #[test]
    fn unknown_task_dependency_is_rejected() {
        let err = parse(
            r#"
            [task_deps]
            scripts = ["fonts"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTask(name) if name == "fonts"));
    }

    #[test]
    fn dependency_cycle_is_rejected() {
        let err = parse(
            r#"
            [task_deps]
            scripts = ["styles"]
            styles = ["scripts"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Cycle(_)));
    }

    #[test]
    fn zero_queue_length_is_rejected() {
        let err = parse(
            r#"
            [watch]
            queue_length = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn normalize_strips_dots() {
        assert_eq!(normalize(Path::new("./a/../b/")), PathBuf::from("b"));
    }
}
