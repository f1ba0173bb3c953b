//! # Audit Records
//!
//! Immutable snapshot of one intercepted call. The outcome is an enum so a
//! record can never carry an error message with SUCCESS, or lack one with
//! FAILED; it is flattened on the wire into `status`, `result` and
//! `errorMessage` fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::serde::format_timestamp;

const RULE: &str = "----------------------------------------------------------";

/// Importance of an audited operation
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditLevel {
    Low,
    #[default]
    Standard,
    High,
    Critical,
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Standard => write!(f, "STANDARD"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Success,
    Failed,
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    Success {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
    Failed {
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

impl AuditOutcome {
    pub fn status(&self) -> AuditStatus {
        match self {
            Self::Success { .. } => AuditStatus::Success,
            Self::Failed { .. } => AuditStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    #[serde(with = "crate::utils::serde::timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Qualified operation name, e.g. `CommandDispatcher.submit`
    pub method_name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<String>,
    #[serde(flatten)]
    pub outcome: AuditOutcome,
    pub execution_time_ms: u64,
    pub level: AuditLevel,
}

impl AuditRecord {
    pub fn status(&self) -> AuditStatus {
        self.outcome.status()
    }

    pub fn result(&self) -> Option<&str> {
        match &self.outcome {
            AuditOutcome::Success { result } => result.as_deref(),
            AuditOutcome::Failed { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            AuditOutcome::Success { .. } => None,
            AuditOutcome::Failed { error_message } => Some(error_message),
        }
    }

    /// Multi-line block written by the local-log sink
    pub fn render_text(&self) -> String {
        let mut text = format!(
            "\n{RULE}\nTime: {}\nOperation: {}\nDescription: {}\nStatus: {}\nExecution time: {} ms\nLevel: {}",
            format_timestamp(&self.timestamp),
            self.method_name,
            self.description,
            self.status(),
            self.execution_time_ms,
            self.level,
        );

        if let Some(parameters) = &self.parameters {
            text.push_str(&format!("\nParameters: {parameters}"));
        }
        if let Some(result) = self.result() {
            text.push_str(&format!("\nResult: {result}"));
        }
        if let Some(error) = self.error_message() {
            text.push_str(&format!("\nError: {error}"));
        }

        text.push('\n');
        text.push_str(RULE);
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(outcome: AuditOutcome) -> AuditRecord {
        AuditRecord {
            timestamp: Utc.with_ymd_and_hms(2122, 6, 3, 9, 0, 0).unwrap(),
            method_name: "CommandDispatcher.submit".to_string(),
            description: "Dispatch command".to_string(),
            parameters: Some(r#"{"author":"ripley"}"#.to_string()),
            outcome,
            execution_time_ms: 12,
            level: AuditLevel::High,
        }
    }

    #[test]
    fn test_failed_record_wire_shape() {
        let json = serde_json::to_value(record(AuditOutcome::Failed {
            error_message: "queue full".to_string(),
        }))
        .unwrap();

        assert_eq!(json["status"], "FAILED");
        assert_eq!(json["errorMessage"], "queue full");
        assert_eq!(json["methodName"], "CommandDispatcher.submit");
        assert_eq!(json["executionTimeMs"], 12);
        assert_eq!(json["level"], "HIGH");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_success_record_parses_back() {
        let original = record(AuditOutcome::Success {
            result: Some("\"ok\"".to_string()),
        });
        let json = serde_json::to_string(&original).unwrap();
        let parsed: AuditRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
        assert_eq!(parsed.error_message(), None);
    }

    #[test]
    fn test_render_text_includes_optional_sections() {
        let text = record(AuditOutcome::Failed {
            error_message: "boom".to_string(),
        })
        .render_text();

        assert!(text.contains("Time: 03-06-2122T09:00:00"));
        assert!(text.contains("Status: FAILED"));
        assert!(text.contains("Execution time: 12 ms"));
        assert!(text.contains("Parameters: {\"author\":\"ripley\"}"));
        assert!(text.contains("Error: boom"));
        assert!(!text.contains("Result:"));
    }
}
