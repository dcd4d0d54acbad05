//! Staged configuration loader.
//!
//! `load` runs the stages in order: read the file, parse the YAML,
//! pull in question packs, validate everything, and resolve the raw
//! schema into ready-to-use settings. Validation failures are
//! collected into one [`ConfigError::ValidationError`] rather than
//! reported one at a time; non-fatal findings ride along as warnings
//! on the result.

use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::bank::QuestionDef;
use crate::config::schema::QuizConfig;
use crate::error::{ConfigError, Severity, ValidationIssue};
use crate::session::SessionSettings;

/// Resolved product of a successful load.
#[derive(Debug, Clone)]
pub struct Loaded {
    /// Session quadruple resolved from the file.
    pub settings: SessionSettings,
    /// Every question definition: packs in listed order, inline after.
    pub questions: Vec<QuestionDef>,
    /// Gateway settings.
    pub server: ServerSettings,
    /// Non-fatal findings worth surfacing to the operator.
    pub warnings: Vec<ValidationIssue>,
}

/// Resolved gateway settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Bind address, still in shorthand form; the gateway normalizes it.
    pub bind: String,
    /// Prometheus exporter port, when enabled.
    pub metrics_port: Option<u16>,
}

/// Loads and validates the configuration file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::MissingFile`] when the file does not exist,
/// [`ConfigError::ParseError`] when the YAML (or a question pack) does
/// not parse, and [`ConfigError::ValidationError`] carrying every
/// finding when the parsed content is unusable.
pub fn load(path: &Path) -> Result<Loaded, ConfigError> {
    let raw = read_file(path)?;
    let config = parse_yaml(path, &raw)?;
    resolve(path, &config)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::MissingFile {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::ParseError {
                path: path.to_path_buf(),
                line: None,
                message: format!("read failed: {e}"),
            }
        }
    })
}

fn parse_yaml(path: &Path, raw: &str) -> Result<QuizConfig, ConfigError> {
    serde_yaml::from_str(raw).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        line: e.location().map(|loc| loc.line()),
        message: e.to_string(),
    })
}

fn resolve(path: &Path, config: &QuizConfig) -> Result<Loaded, ConfigError> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let question_time = parse_duration_field(
        "session.question_time",
        &config.session.question_time,
        &mut errors,
    );
    let score_time = parse_duration_field(
        "session.score_time",
        &config.session.score_time,
        &mut errors,
    );
    let register_wait_time = parse_duration_field(
        "session.register_wait_time",
        &config.session.register_wait_time,
        &mut errors,
    );

    // a zero join window is legal (players pre-register via reset flows);
    // a zero answer window would make scoring meaningless
    if question_time.is_some_and(|d| d.is_zero()) {
        errors.push(issue(
            "session.question_time",
            "must be a positive duration",
            Severity::Error,
        ));
    }
    if config.session.total_questions == 0 {
        errors.push(issue(
            "session.total_questions",
            "must be at least 1",
            Severity::Error,
        ));
    }

    let questions = collect_questions(path, config, &mut errors);
    validate_questions(&questions, &mut errors, &mut warnings);

    if !questions.is_empty() && config.session.total_questions > questions.len() {
        warnings.push(issue(
            "session.total_questions",
            format!(
                "{} requested but only {} questions available; the session clamps to the bank size",
                config.session.total_questions,
                questions.len()
            ),
            Severity::Warning,
        ));
    }

    if !errors.is_empty() {
        return Err(ConfigError::ValidationError {
            path: path.display().to_string(),
            errors,
        });
    }
    let (Some(question_time), Some(score_time), Some(register_wait_time)) =
        (question_time, score_time, register_wait_time)
    else {
        return Err(ConfigError::ValidationError {
            path: path.display().to_string(),
            errors,
        });
    };

    debug!(
        questions = questions.len(),
        total = config.session.total_questions,
        "configuration resolved"
    );

    Ok(Loaded {
        settings: SessionSettings {
            total_questions: config.session.total_questions,
            question_time,
            score_time,
            register_wait_time,
        },
        questions,
        server: ServerSettings {
            bind: config.server.bind.clone(),
            metrics_port: config.server.metrics_port,
        },
        warnings,
    })
}

fn collect_questions(
    path: &Path,
    config: &QuizConfig,
    errors: &mut Vec<ValidationIssue>,
) -> Vec<QuestionDef> {
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let mut questions = Vec::new();

    for (i, pack) in config.questions.packs.iter().enumerate() {
        let pack_path = base.join(pack);
        match load_pack(&pack_path) {
            Ok(mut defs) => {
                debug!(pack = %pack_path.display(), count = defs.len(), "question pack loaded");
                questions.append(&mut defs);
            }
            Err(e) => errors.push(issue(
                format!("questions.packs[{i}]"),
                e.to_string(),
                Severity::Error,
            )),
        }
    }

    questions.extend(config.questions.inline.iter().cloned());
    if questions.is_empty() {
        errors.push(issue(
            "questions",
            "no questions configured; add packs or inline definitions",
            Severity::Error,
        ));
    }
    questions
}

fn load_pack(path: &Path) -> Result<Vec<QuestionDef>, ConfigError> {
    let raw = read_file(path)?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        line: if e.line() == 0 { None } else { Some(e.line()) },
        message: e.to_string(),
    })
}

fn validate_questions(
    questions: &[QuestionDef],
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    for (i, def) in questions.iter().enumerate() {
        let at = |field: &str| format!("questions[{i}].{field}");

        if def.statement.trim().is_empty() {
            errors.push(issue(at("statement"), "must not be empty", Severity::Error));
        }
        if def.options.len() < 2 {
            errors.push(issue(
                at("options"),
                "needs at least 2 options",
                Severity::Error,
            ));
        }
        if !def.options.contains(&def.answer) {
            errors.push(issue(
                at("answer"),
                format!("'{}' is not among the options", def.answer),
                Severity::Error,
            ));
        }

        let mut seen = std::collections::BTreeSet::new();
        for option in &def.options {
            if !seen.insert(option) {
                warnings.push(issue(
                    at("options"),
                    format!("duplicate option '{option}'"),
                    Severity::Warning,
                ));
            }
        }
    }
}

fn parse_duration_field(
    field: &str,
    raw: &str,
    errors: &mut Vec<ValidationIssue>,
) -> Option<Duration> {
    match humantime::parse_duration(raw) {
        Ok(duration) => Some(duration),
        Err(e) => {
            errors.push(issue(
                field,
                format!("bad duration '{raw}': {e}"),
                Severity::Error,
            ));
            None
        }
    }
}

fn issue(path: impl Into<String>, message: impl Into<String>, severity: Severity) -> ValidationIssue {
    ValidationIssue {
        path: path.into(),
        message: message.into(),
        severity,
    }
}
