use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ApiClient, ApiError};
use crate::models::{DataSource, HealthSuggestion};

const PIPELINE_BASE: &str = "/data-pipeline/v1";

const SPREADSHEET_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls"];
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Spreadsheet,
    Document,
}

impl UploadKind {
    /// Picks the upload endpoint from the file extension.
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
            Some(UploadKind::Spreadsheet)
        } else if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            Some(UploadKind::Document)
        } else {
            None
        }
    }

    fn endpoint(&self) -> &'static str {
        match self {
            UploadKind::Spreadsheet => "upload-spreadsheet",
            UploadKind::Document => "upload-document",
        }
    }
}

#[derive(Debug, Deserialize)]
struct SourceList {
    data_sources: Vec<DataSource>,
}

#[derive(Debug, Deserialize)]
struct TableList {
    tables: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QuestionList {
    questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct HealthReport {
    #[serde(default)]
    suggestions: Vec<HealthSuggestion>,
}

#[derive(Debug, Serialize)]
struct TablesRequest<'a> {
    db_url: &'a str,
}

#[derive(Debug, Serialize)]
struct ConnectRequest<'a> {
    table_name: &'a str,
    source_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct Registered {
    #[serde(alias = "data_source_id")]
    id: i64,
}

impl ApiClient {
    pub async fn list_sources(&self) -> Result<Vec<DataSource>, ApiError> {
        let list: SourceList = self
            .get(&format!("{}/get-data-sources", PIPELINE_BASE))
            .await?;
        Ok(list.data_sources)
    }

    pub async fn source_tables(&self, connection_url: &str) -> Result<Vec<String>, ApiError> {
        let list: TableList = self
            .post(
                &format!("{}/get-source-tables", PIPELINE_BASE),
                &TablesRequest {
                    db_url: connection_url,
                },
            )
            .await?;
        Ok(list.tables)
    }

    pub async fn suggest_questions(&self, source_id: i64) -> Result<Vec<String>, ApiError> {
        let list: QuestionList = self
            .get(&format!("{}/suggest-questions/{}", PIPELINE_BASE, source_id))
            .await?;
        Ok(list.questions)
    }

    pub async fn analyze_health(&self, source_id: i64) -> Result<Vec<HealthSuggestion>, ApiError> {
        let report: HealthReport = self
            .get(&format!("{}/analyze-health/{}", PIPELINE_BASE, source_id))
            .await?;
        Ok(report.suggestions)
    }

    pub async fn delete_source(&self, source_id: i64) -> Result<(), ApiError> {
        let _: Value = self
            .delete(&format!("{}/delete-datasource/{}", PIPELINE_BASE, source_id))
            .await?;
        Ok(())
    }

    /// Registers a database connection string as a `url` source.
    pub async fn connect_source(&self, name: &str, connection_url: &str) -> Result<i64, ApiError> {
        let registered: Registered = self
            .post(
                &format!("{}/add-datasource", PIPELINE_BASE),
                &ConnectRequest {
                    table_name: name,
                    source_name: connection_url,
                },
            )
            .await?;
        Ok(registered.id)
    }

    pub async fn upload_source(&self, path: &Path, kind: UploadKind) -> Result<i64, ApiError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));

        let registered: Registered = self
            .post_multipart(&format!("{}/{}", PIPELINE_BASE, kind.endpoint()), form)
            .await?;
        Ok(registered.id)
    }
}
