// src/report.rs

use serde::Serialize;

use crate::error::IngestError;

/// What was loaded for one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub table: String,
    pub rows: usize,
    pub columns: Vec<String>,
}

/// Accumulated result of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub total_rows: usize,
    pub tables: Vec<TableReport>,
}

impl RunReport {
    pub fn push(&mut self, table: TableReport) {
        self.total_rows += table.rows;
        self.tables.push(table);
    }
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub total_rows: usize,
    pub tables: Vec<TableReport>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Success(SuccessResponse),
    Error(ErrorResponse),
}

impl From<RunReport> for SuccessResponse {
    fn from(report: RunReport) -> Self {
        Self {
            status: "success",
            message: "Data stored successfully",
            total_rows: report.total_rows,
            tables: report.tables,
        }
    }
}

impl From<&IngestError> for ErrorResponse {
    fn from(err: &IngestError) -> Self {
        Self {
            status: "error",
            message: err.to_string(),
            details: err.details(),
        }
    }
}

/// HTTP status code and body for the outcome of a run.
pub fn respond(outcome: Result<RunReport, IngestError>) -> (u16, ResponseBody) {
    match outcome {
        Ok(report) => (200, ResponseBody::Success(report.into())),
        Err(err) => (err.status(), ResponseBody::Error((&err).into())),
    }
}
