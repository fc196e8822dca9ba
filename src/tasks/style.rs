// src/tasks/style.rs

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use tracing::{debug, info, warn};

use crate::config::Mode;
use crate::detect::{filter_changed, OutputRef};
use crate::errors::TaskError;
use crate::files;
use crate::tasks::{write_output, TaskContext, TaskReport, Transform};

/// Canonical basename of the compiled stylesheet, whatever the entry is called.
pub const STYLES_OUTPUT: &str = "styles.css";

/// Compile the entry stylesheet with grass, then post-process with
/// lightningcss: vendor prefixes and minification in production only.
/// A source map is written in both modes.
#[derive(Debug, Clone)]
pub struct StyleTask {
    group: String,
}

/// CSS text plus its source map (JSON).
#[derive(Debug)]
pub struct CompiledCss {
    pub code: String,
    pub map: String,
}

impl StyleTask {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
        }
    }

    fn run(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
        let task = self.group.as_str();
        let cfg = &ctx.config;
        let root = &cfg.project_root;

        let globs = cfg.resolve_source_globs(task).map_err(|source| TaskError::Config {
            task: task.to_string(),
            source,
        })?;
        let inputs = files::expand(root, &globs)
            .map_err(|e| TaskError::io(task, root, std::io::Error::other(format!("{e:#}"))))?
            .files;

        let entry = root.join(cfg.styles_entry());
        if !entry.is_file() {
            if inputs.is_empty() {
                debug!(task, "no stylesheets in project");
                return Ok(TaskReport::up_to_date());
            }
            return Err(TaskError::MissingInput {
                task: task.to_string(),
                path: entry,
            });
        }

        let out_dir = ctx.output_dir(task, task)?;
        let css_path = out_dir.join(STYLES_OUTPUT);
        if css_path.is_file() && filter_changed(&inputs, OutputRef::Single(&css_path)).is_empty() {
            debug!(task, "stylesheet is up to date");
            return Ok(TaskReport::up_to_date());
        }

        let options = grass::Options::default().load_path(root.join(cfg.styles_source_dir()));
        let css = grass::from_path(&entry, &options).map_err(|e| TaskError::Compile {
            task: task.to_string(),
            file: entry.clone(),
            message: e.to_string(),
        })?;

        // grass emits no map of its own, so the map points at the compiled
        // CSS it embeds, named after the entry.
        let source_name = files::relative_str(root, &entry.with_extension("css"))
            .unwrap_or_else(|| STYLES_OUTPUT.to_string());
        let compiled = post_process(&css, &source_name, &cfg.browsers, ctx.mode).map_err(
            |message| TaskError::Compile {
                task: task.to_string(),
                file: entry.clone(),
                message,
            },
        )?;

        let map_name = format!("{STYLES_OUTPUT}.map");
        let map_path = out_dir.join(&map_name);
        let code = format!("{}\n/*# sourceMappingURL={map_name} */\n", compiled.code);
        write_output(task, &css_path, code.as_bytes())?;
        write_output(task, &map_path, compiled.map.as_bytes())?;

        info!(task, mode = %ctx.mode, bytes = code.len(), "stylesheet written");
        Ok(TaskReport {
            files_written: vec![css_path, map_path],
            ..TaskReport::default()
        })
    }
}

impl Transform for StyleTask {
    fn label(&self) -> String {
        self.group.clone()
    }

    fn execute(&self, ctx: &TaskContext) -> TaskReport {
        match self.run(ctx) {
            Ok(report) => report,
            Err(err) => {
                if !err.is_fatal() {
                    warn!(task = %self.group, "{err}; keeping the previous stylesheet");
                }
                TaskReport::failed(err)
            }
        }
    }
}

/// Run compiled CSS through lightningcss.
///
/// `source_name` is what the source map points back to. `css` is embedded
/// as that source's content.
pub fn post_process(
    css: &str,
    source_name: &str,
    browsers: &[String],
    mode: Mode,
) -> Result<CompiledCss, String> {
    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: source_name.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| e.to_string())?;

    let targets = if mode.is_production() {
        targets_for(browsers)?
    } else {
        Targets::default()
    };

    if mode.is_production() {
        sheet
            .minify(MinifyOptions {
                targets,
                ..MinifyOptions::default()
            })
            .map_err(|e| e.to_string())?;
    }

    let mut map = SourceMap::new("/");
    map.add_source(source_name);
    map.set_source_content(0, css).map_err(|e| format!("{e:?}"))?;

    let printed = sheet
        .to_css(PrinterOptions {
            minify: mode.is_production(),
            source_map: Some(&mut map),
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;

    let map = map.to_json(None).map_err(|e| format!("{e:?}"))?;
    Ok(CompiledCss {
        code: printed.code,
        map,
    })
}

fn targets_for(browsers: &[String]) -> Result<Targets, String> {
    if browsers.is_empty() {
        return Ok(Targets::default());
    }
    let browsers = Browsers::from_browserslist(browsers.iter().map(String::as_str))
        .map_err(|e| e.to_string())?;
    Ok(Targets {
        browsers,
        ..Targets::default()
    })
}
