//! Configuration file schema.
//!
//! The YAML file has three sections, all optional except that at least
//! one question must come out of `questions`:
//!
//! ```yaml
//! session:
//!   total_questions: 10
//!   question_time: 30s
//!   score_time: 10s
//!   register_wait_time: 10s
//! server:
//!   bind: 127.0.0.1:8080
//!   metrics_port: 9100
//! questions:
//!   packs:
//!     - questions/general.json
//!   inline:
//!     - statement: "Largest planet?"
//!       answer: "Jupiter"
//!       options: ["Mars", "Jupiter", "Venus"]
//! ```
//!
//! Durations are humantime strings (`30s`, `2m`, `1500ms`). Pack paths
//! resolve relative to the configuration file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::bank::QuestionDef;

/// Root of the configuration file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QuizConfig {
    /// Session timing and size.
    #[serde(default)]
    pub session: SessionSection,
    /// HTTP gateway settings.
    #[serde(default)]
    pub server: ServerSection,
    /// Where questions come from.
    #[serde(default)]
    pub questions: QuestionsSection,
}

/// The `session:` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSection {
    /// Questions played per session.
    #[serde(default = "default_total_questions")]
    pub total_questions: usize,
    /// Length of each answer window.
    #[serde(default = "default_question_time")]
    pub question_time: String,
    /// Pause on the standings between questions.
    #[serde(default = "default_score_time")]
    pub score_time: String,
    /// Length of the join window.
    #[serde(default = "default_register_wait_time")]
    pub register_wait_time: String,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            total_questions: default_total_questions(),
            question_time: default_question_time(),
            score_time: default_score_time(),
            register_wait_time: default_register_wait_time(),
        }
    }
}

/// The `server:` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSection {
    /// Bind address; `:8080` and `8080` shorthands are accepted.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port for the Prometheus exporter; omitted disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_port: None,
        }
    }
}

/// The `questions:` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QuestionsSection {
    /// JSON pack files, each holding a list of question definitions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packs: Vec<PathBuf>,
    /// Questions defined inline in the configuration file.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inline: Vec<QuestionDef>,
}

fn default_total_questions() -> usize {
    10
}

fn default_question_time() -> String {
    "30s".to_string()
}

fn default_score_time() -> String {
    "10s".to_string()
}

fn default_register_wait_time() -> String {
    "10s".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gets_defaults() {
        let config: QuizConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.session.total_questions, 10);
        assert_eq!(config.session.question_time, "30s");
        assert_eq!(config.session.score_time, "10s");
        assert_eq!(config.session.register_wait_time, "10s");
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert!(config.server.metrics_port.is_none());
        assert!(config.questions.packs.is_empty());
        assert!(config.questions.inline.is_empty());
    }

    #[test]
    fn partial_session_section_keeps_other_defaults() {
        let config: QuizConfig = serde_yaml::from_str(
            r"
session:
  question_time: 45s
",
        )
        .unwrap();
        assert_eq!(config.session.question_time, "45s");
        assert_eq!(config.session.total_questions, 10);
    }

    #[test]
    fn inline_questions_deserialize() {
        let config: QuizConfig = serde_yaml::from_str(
            r#"
questions:
  inline:
    - statement: "Largest planet?"
      answer: "Jupiter"
      options: ["Mars", "Jupiter", "Venus"]
"#,
        )
        .unwrap();
        assert_eq!(config.questions.inline.len(), 1);
        assert_eq!(config.questions.inline[0].answer, "Jupiter");
        assert_eq!(config.questions.inline[0].options.len(), 3);
    }

    #[test]
    fn packs_and_metrics_port_deserialize() {
        let config: QuizConfig = serde_yaml::from_str(
            r"
server:
  bind: ':9000'
  metrics_port: 9100
questions:
  packs:
    - questions/general.json
",
        )
        .unwrap();
        assert_eq!(config.server.bind, ":9000");
        assert_eq!(config.server.metrics_port, Some(9100));
        assert_eq!(
            config.questions.packs,
            vec![PathBuf::from("questions/general.json")]
        );
    }
}
