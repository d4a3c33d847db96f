use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[serde(alias = "document")]
    File,
    Spreadsheet,
    Url,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::File => "file",
            SourceKind::Spreadsheet => "spreadsheet",
            SourceKind::Url => "url",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    #[serde(default)]
    pub connection_url: Option<String>,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl DataSource {
    /// What the source table shows in its "Source name" column.
    pub fn location(&self) -> &str {
        match self.kind {
            SourceKind::Url => self.connection_url.as_deref().unwrap_or_default(),
            SourceKind::Spreadsheet => self.table_name.as_deref().unwrap_or_default(),
            SourceKind::File => &self.name,
        }
    }

    /// Connection string for database-backed sources only.
    pub fn connection_string(&self) -> Option<&str> {
        match self.kind {
            SourceKind::Url => self.connection_url.as_deref().filter(|u| !u.is_empty()),
            _ => None,
        }
    }
}

/// Entry in a source dropdown.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOption {
    pub id: i64,
    pub name: String,
}

impl From<&DataSource> for SourceOption {
    fn from(source: &DataSource) -> Self {
        SourceOption {
            id: source.id,
            name: source.name.clone(),
        }
    }
}

impl fmt::Display for SourceOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
}

impl TaskStatus {
    /// Completed goes back to pending; anything else becomes completed.
    pub fn toggled(self) -> Self {
        match self {
            TaskStatus::Completed => TaskStatus::Pending,
            TaskStatus::Pending | TaskStatus::InProgress => TaskStatus::Completed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub data_source_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTask {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    pub data_source_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
}

impl Conversation {
    pub fn label(&self) -> String {
        self.title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("Conversation {}", self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSuggestion {
    pub issue: String,
    pub fix: String,
}

/// One suggestion per line, bullet-prefixed. `None` means the data looks healthy.
pub fn format_health_report(suggestions: &[HealthSuggestion]) -> Option<String> {
    if suggestions.is_empty() {
        return None;
    }
    Some(
        suggestions
            .iter()
            .map(|s| format!("• {}: {}", s.issue, s.fix))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// One streamed piece of an assistant answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Fragment {
    pub fn answer(text: impl Into<String>) -> Self {
        Fragment {
            answer: Some(text.into()),
            error: None,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Fragment {
            answer: None,
            error: Some(text.into()),
        }
    }

    /// Error text reads like any other narrative text.
    pub fn text(&self) -> &str {
        self.answer
            .as_deref()
            .filter(|a| !a.is_empty())
            .or(self.error.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(rename = "conversaction_id")]
    pub conversation_id: i64,
    pub dataset_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_ids: Option<Vec<i64>>,
    pub selected_tables: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub llm_model: String,
}

/// Renders backend timestamps (`YYYY-MM-DD` or ISO 8601) as a plain date.
pub fn display_date(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format("%Y-%m-%d").to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.format("%Y-%m-%d").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_toggle_is_binary() {
        assert_eq!(TaskStatus::Completed.toggled(), TaskStatus::Pending);
        assert_eq!(TaskStatus::Pending.toggled(), TaskStatus::Completed);
        assert_eq!(TaskStatus::InProgress.toggled(), TaskStatus::Completed);

        let once = TaskStatus::Pending.toggled();
        assert_eq!(once, TaskStatus::Completed);
        assert_eq!(once.toggled(), TaskStatus::Pending);

        // in-progress never comes back from a double toggle
        assert_eq!(TaskStatus::InProgress.toggled().toggled(), TaskStatus::Pending);
    }

    #[test]
    fn test_task_wire_format() {
        let raw = json!({
            "id": 7,
            "title": "Check Q3",
            "description": null,
            "status": "in-progress",
            "priority": "high",
            "data_source_id": 3,
            "created_at": "2024-05-01T10:20:30.123456"
        });
        let parsed: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.status, TaskStatus::InProgress);
        assert_eq!(parsed.priority, TaskPriority::High);
        assert_eq!(parsed.data_source_id, Some(3));
        assert_eq!(display_date(parsed.created_at.as_deref().unwrap()), "2024-05-01");
    }

    #[test]
    fn test_new_task_sends_null_source() {
        let body = serde_json::to_value(NewTask {
            title: "T".to_string(),
            description: None,
            status: None,
            priority: None,
            data_source_id: None,
        })
        .unwrap();
        assert_eq!(body, json!({"title": "T", "data_source_id": null}));
    }

    #[test]
    fn test_patch_only_serializes_set_fields() {
        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"status": "completed"}));
    }

    #[test]
    fn test_source_location_by_kind() {
        let raw = json!([
            {"id": 1, "name": "sales.csv", "type": "spreadsheet", "table_name": "sales_ab12", "created_at": "2024-01-02"},
            {"id": 2, "name": "orders", "type": "url", "connection_url": "postgresql://db/shop"},
            {"id": 3, "name": "report.pdf", "type": "document"}
        ]);
        let sources: Vec<DataSource> = serde_json::from_value(raw).unwrap();
        assert_eq!(sources[0].location(), "sales_ab12");
        assert_eq!(sources[1].location(), "postgresql://db/shop");
        assert_eq!(sources[1].connection_string(), Some("postgresql://db/shop"));
        assert_eq!(sources[2].kind, SourceKind::File);
        assert_eq!(sources[2].location(), "report.pdf");
        assert_eq!(sources[0].connection_string(), None);
    }

    #[test]
    fn test_fragment_text_prefers_answer_then_error() {
        assert_eq!(Fragment::answer("hi").text(), "hi");
        assert_eq!(Fragment::error("boom").text(), "boom");
        let empty_answer = Fragment {
            answer: Some(String::new()),
            error: Some("fallback".to_string()),
        };
        assert_eq!(empty_answer.text(), "fallback");
        assert_eq!(Fragment::default().text(), "");
    }

    #[test]
    fn test_ask_request_uses_backend_field_names() {
        let body = serde_json::to_value(AskRequest {
            question: "q".to_string(),
            conversation_id: 4,
            dataset_id: 0,
            dataset_ids: None,
            selected_tables: vec![],
            kind: "task".to_string(),
            llm_model: "m".to_string(),
        })
        .unwrap();
        assert_eq!(body["conversaction_id"], 4);
        assert_eq!(body["type"], "task");
        assert!(body.get("dataset_ids").is_none());
    }

    #[test]
    fn test_health_report_formatting() {
        assert_eq!(format_health_report(&[]), None);
        let report = format_health_report(&[
            HealthSuggestion {
                issue: "Mixed city names".to_string(),
                fix: "Normalize NYC".to_string(),
            },
            HealthSuggestion {
                issue: "Null prices".to_string(),
                fix: "Impute median".to_string(),
            },
        ])
        .unwrap();
        assert_eq!(report, "• Mixed city names: Normalize NYC\n• Null prices: Impute median");
    }

    #[test]
    fn test_display_date_falls_back_to_raw() {
        assert_eq!(display_date("2024-02-03"), "2024-02-03");
        assert_eq!(display_date("2024-02-03T04:05:06+00:00"), "2024-02-03");
        assert_eq!(display_date("yesterday"), "yesterday");
    }

    #[test]
    fn test_conversation_label() {
        let untitled = Conversation { id: 9, title: None };
        assert_eq!(untitled.label(), "Conversation 9");
        let titled = Conversation {
            id: 1,
            title: Some("Sales".to_string()),
        };
        assert_eq!(titled.label(), "Sales");
    }
}
