// src/tasks/script.rs

use std::fs;
use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::config::ScriptBundle;
use crate::detect::{filter_changed, CacheEntry, FileStamp, OutputRef};
use crate::errors::TaskError;
use crate::files::{self, SourceFile};
use crate::tasks::lint::{lint_source, LintDiagnostic};
use crate::tasks::minify::minify_js;
use crate::tasks::{write_output, TaskContext, TaskReport, Transform};

/// Lint, concatenate and (in production) minify one `[[files.js]]` bundle.
///
/// The `scripts` task fans out into one of these per bundle.
#[derive(Debug, Clone)]
pub struct ScriptBundleTask {
    group: String,
    bundle: ScriptBundle,
}

impl ScriptBundleTask {
    pub fn new(group: impl Into<String>, bundle: ScriptBundle) -> Self {
        Self {
            group: group.into(),
            bundle,
        }
    }

    fn cache_scope(&self) -> String {
        format!("lint-{}", self.bundle.name)
    }

    fn run(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
        let task = self.group.as_str();
        let root = &ctx.config.project_root;

        let expansion = files::expand(root, &self.bundle.files).map_err(|e| {
            TaskError::io(task, root, std::io::Error::other(format!("{e:#}")))
        })?;
        if let Some(path) = expansion.missing.into_iter().next() {
            return Err(TaskError::MissingInput {
                task: task.to_string(),
                path,
            });
        }
        let sources = expansion.files;

        let out_dir = ctx.output_dir(task, task)?;
        let bundle_path = out_dir.join(&self.bundle.name);
        if bundle_path.is_file()
            && filter_changed(&sources, OutputRef::Single(&bundle_path)).is_empty()
        {
            debug!(bundle = %self.bundle.name, "bundle is up to date");
            return Ok(TaskReport::up_to_date());
        }

        let mut contents = Vec::with_capacity(sources.len());
        for file in &sources {
            let text = fs::read_to_string(&file.path)
                .map_err(|e| TaskError::io(task, &file.path, e))?;
            contents.push(text);
        }

        let diagnostics = self.lint_group(ctx, &sources, &contents);
        for diag in &diagnostics {
            if diag.is_error() {
                error!(bundle = %self.bundle.name, "{diag}");
            } else {
                warn!(bundle = %self.bundle.name, "{diag}");
            }
        }
        if diagnostics.iter().any(LintDiagnostic::is_error) {
            return Err(TaskError::Lint {
                task: task.to_string(),
                group: self.bundle.name.clone(),
                diagnostics,
            });
        }

        let bundle = concatenate(&sources, &contents);
        let mut report = TaskReport::default();

        if ctx.mode.is_production() {
            let minified = minify_js(&bundle, &self.bundle.name).map_err(|message| {
                TaskError::Minify {
                    task: task.to_string(),
                    file: bundle_path.clone(),
                    message,
                }
            })?;
            let map_name = format!("{}.map", self.bundle.name);
            let map_path = out_dir.join(&map_name);
            let code = format!("{}\n//# sourceMappingURL={map_name}\n", minified.code);

            write_output(task, &bundle_path, code.as_bytes())?;
            write_output(task, &map_path, minified.map.as_bytes())?;
            report.files_written.push(bundle_path);
            report.files_written.push(map_path);
        } else {
            write_output(task, &bundle_path, bundle.as_bytes())?;
            report.files_written.push(bundle_path);
        }

        info!(
            bundle = %self.bundle.name,
            files = sources.len(),
            mode = %ctx.mode,
            "bundle written"
        );
        Ok(report)
    }

    /// Lint every file of the bundle, reusing remembered results for files
    /// that have not changed, so the full group state is always reported.
    fn lint_group(
        &self,
        ctx: &TaskContext,
        sources: &[SourceFile],
        contents: &[String],
    ) -> Vec<LintDiagnostic> {
        let scope = self.cache_scope();
        let mut all = Vec::new();

        for (file, text) in sources.iter().zip(contents) {
            if let Ok(Some(entry)) = ctx.cache.lookup_unchanged(&scope, &file.path) {
                debug!(file = %file.display, "reusing lint results");
                all.extend(entry.diagnostics);
                continue;
            }

            let diagnostics = lint_source(&file.display, text, &ctx.config.lint);
            match FileStamp::read(&file.path) {
                Ok(stamp) => ctx.cache.record(
                    &scope,
                    &file.path,
                    CacheEntry {
                        stamp,
                        diagnostics: diagnostics.clone(),
                    },
                ),
                Err(e) => debug!(file = %file.display, error = %e, "not caching lint results"),
            }
            all.extend(diagnostics);
        }

        let keep: Vec<PathBuf> = sources.iter().map(|f| f.path.clone()).collect();
        ctx.cache.retain(&scope, &keep);
        all
    }
}

impl Transform for ScriptBundleTask {
    fn label(&self) -> String {
        format!("{}[{}]", self.group, self.bundle.name)
    }

    fn execute(&self, ctx: &TaskContext) -> TaskReport {
        self.run(ctx).unwrap_or_else(TaskReport::failed)
    }
}

/// Concatenate sources in the given order, each behind a provenance header.
pub fn concatenate(sources: &[SourceFile], contents: &[String]) -> String {
    let mut out = String::new();
    for (file, text) in sources.iter().zip(contents) {
        out.push_str("// FILE: ");
        out.push_str(&file.display);
        out.push('\n');
        out.push_str(text);
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    use crate::config::{BuildConfig, Mode, RawConfigFile, GROUP_SCRIPTS};
    use crate::detect::IncrementalCache;
    use tempfile::tempdir;

    fn context(root: &Path, mode: Mode) -> TaskContext {
        let raw: RawConfigFile = toml::from_str(
            r#"
            [paths]
            source = "source"

            [build_paths]
            development = "build/dev"
            production = "build/prod"

            [[files.js]]
            name = "app.js"
            files = ["source/assets/scripts/b.js", "source/assets/scripts/a.js"]
            "#,
        )
        .unwrap();
        let cfg = BuildConfig::from_raw(raw, root).unwrap();
        TaskContext::new(Arc::new(cfg), mode, Arc::new(IncrementalCache::new()))
    }

    fn task(ctx: &TaskContext) -> ScriptBundleTask {
        ScriptBundleTask::new(GROUP_SCRIPTS, ctx.config.script_bundles()[0].clone())
    }

    fn write_sources(root: &Path, a: &str, b: &str) {
        let dir = root.join("source/assets/scripts");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.js"), a).unwrap();
        fs::write(dir.join("b.js"), b).unwrap();
    }

    #[test]
    fn bundle_follows_configured_order() {
        let dir = tempdir().unwrap();
        write_sources(dir.path(), "var A = 1;", "var B = 2;");
        let ctx = context(dir.path(), Mode::Development);

        let report = task(&ctx).execute(&ctx);
        assert!(report.is_success(), "{:?}", report.errors);

        let out = fs::read_to_string(dir.path().join("build/dev/assets/scripts/app.js")).unwrap();
        assert_eq!(
            out,
            "// FILE: source/assets/scripts/b.js\nvar B = 2;\n\n// FILE: source/assets/scripts/a.js\nvar A = 1;\n\n"
        );
        assert_eq!(task(&ctx).label(), "scripts[app.js]");
    }

    #[test]
    fn lint_error_keeps_bundle_unwritten_and_is_remembered() {
        let dir = tempdir().unwrap();
        write_sources(dir.path(), "debugger;", "var B = 2;");
        let ctx = context(dir.path(), Mode::Development);

        let report = task(&ctx).execute(&ctx);
        assert!(report.is_fatal());
        assert!(matches!(
            &report.errors[0],
            TaskError::Lint { group, diagnostics, .. }
                if group == "app.js" && diagnostics.len() == 1
        ));
        assert!(!dir.path().join("build/dev/assets/scripts/app.js").exists());
        assert_eq!(ctx.cache.len(), 2);

        // Unchanged files come from the cache and still fail the group.
        let again = task(&ctx).execute(&ctx);
        assert!(again.is_fatal());
    }

    #[test]
    fn missing_source_is_fatal() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("source/assets/scripts")).unwrap();
        fs::write(dir.path().join("source/assets/scripts/a.js"), "var A;").unwrap();
        let ctx = context(dir.path(), Mode::Development);

        let report = task(&ctx).execute(&ctx);
        assert!(matches!(&report.errors[..], [TaskError::MissingInput { .. }]));
    }

    #[test]
    fn production_bundle_is_minified_with_a_map() {
        let dir = tempdir().unwrap();
        write_sources(
            dir.path(),
            "function greet(name) {\n  return 'hello ' + name;\n}\n",
            "var B = greet('world');\n",
        );
        let ctx = context(dir.path(), Mode::Production);

        let report = task(&ctx).execute(&ctx);
        assert!(report.is_success(), "{:?}", report.errors);
        assert_eq!(report.files_written.len(), 2);

        let out_dir = dir.path().join("build/prod/assets/scripts");
        let code = fs::read_to_string(out_dir.join("app.js")).unwrap();
        assert!(code.ends_with("//# sourceMappingURL=app.js.map\n"));
        assert!(!code.contains("FILE:"));
        assert!(code.contains("greet"), "{code}");
        assert!(code.contains("B="), "{code}");
        assert!(code.contains("hello "));
        assert!(out_dir.join("app.js.map").is_file());
    }
}
