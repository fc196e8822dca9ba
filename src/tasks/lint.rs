// src/tasks/lint.rs

//! JavaScript linting on top of the oxc parser and semantic analysis.
//!
//! Syntax and semantic errors (redeclarations and the like) are always
//! errors. On top of that a handful of rules can be tuned per project in the
//! `[lint]` section:
//!
//! ```toml
//! [lint]
//! no-debugger = "error"
//! no-eval = "error"
//! no-alert = "warn"
//! ```

use std::fmt;

use oxc::allocator::Allocator;
use oxc::ast::AstKind;
use oxc::ast::ast::{CallExpression, Expression};
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::SourceType;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Off,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Off => f.write_str("off"),
            Severity::Warn => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// `[lint]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LintConfig {
    #[serde(default = "error")]
    pub no_debugger: Severity,
    #[serde(default = "error")]
    pub no_eval: Severity,
    #[serde(default = "warn")]
    pub no_alert: Severity,
}

fn error() -> Severity {
    Severity::Error
}

fn warn() -> Severity {
    Severity::Warn
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            no_debugger: error(),
            no_eval: error(),
            no_alert: warn(),
        }
    }
}

/// One finding in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintDiagnostic {
    /// Path as configured (relative to the project root).
    pub file: String,
    /// 1-based position; parser and semantic errors carry none.
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub rule: String,
    pub severity: Severity,
    pub message: String,
}

impl LintDiagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for LintDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(col)) => write!(f, "{}:{line}:{col}", self.file)?,
            _ => write!(f, "{}", self.file)?,
        }
        write!(f, "  {}  {}  {}", self.severity, self.message, self.rule)
    }
}

/// Lint one file's source text. `file` is only used for reporting.
pub fn lint_source(file: &str, source: &str, config: &LintConfig) -> Vec<LintDiagnostic> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, SourceType::script()).parse();

    let mut diagnostics: Vec<LintDiagnostic> = parsed
        .errors
        .iter()
        .map(|e| unpositioned(file, "syntax", e.to_string()))
        .collect();
    if parsed.panicked || !diagnostics.is_empty() {
        return diagnostics;
    }

    let built = SemanticBuilder::new()
        .with_check_syntax_error(true)
        .build(&parsed.program);
    diagnostics.extend(
        built
            .errors
            .iter()
            .map(|e| unpositioned(file, "semantic", e.to_string())),
    );

    for node in built.semantic.nodes().iter() {
        match node.kind() {
            AstKind::DebuggerStatement(stmt) => push_rule(
                &mut diagnostics,
                file,
                source,
                stmt.span.start,
                "no-debugger",
                config.no_debugger,
                "Unexpected 'debugger' statement".to_string(),
            ),
            AstKind::CallExpression(call) => {
                if let Some(name) = callee_name(call) {
                    match name {
                        "eval" => push_rule(
                            &mut diagnostics,
                            file,
                            source,
                            call.span.start,
                            "no-eval",
                            config.no_eval,
                            "eval can be harmful".to_string(),
                        ),
                        "alert" | "confirm" | "prompt" => push_rule(
                            &mut diagnostics,
                            file,
                            source,
                            call.span.start,
                            "no-alert",
                            config.no_alert,
                            format!("Unexpected {name}"),
                        ),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    diagnostics
}

fn callee_name<'a>(call: &'a CallExpression<'_>) -> Option<&'a str> {
    match &call.callee {
        Expression::Identifier(id) => Some(id.name.as_str()),
        _ => None,
    }
}

fn unpositioned(file: &str, rule: &str, message: String) -> LintDiagnostic {
    LintDiagnostic {
        file: file.to_string(),
        line: None,
        column: None,
        rule: rule.to_string(),
        severity: Severity::Error,
        message,
    }
}

fn push_rule(
    out: &mut Vec<LintDiagnostic>,
    file: &str,
    source: &str,
    offset: u32,
    rule: &str,
    severity: Severity,
    message: String,
) {
    if severity == Severity::Off {
        return;
    }
    let (line, column) = line_col(source, offset as usize);
    out.push(LintDiagnostic {
        file: file.to_string(),
        line: Some(line),
        column: Some(column),
        rule: rule.to_string(),
        severity,
        message,
    });
}

/// 1-based line and column of a byte offset.
fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let before = &source[..offset.min(source.len())];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    (line, before[line_start..].chars().count() + 1)
}
