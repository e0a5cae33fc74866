use std::fmt;

use crate::cell_id::CellId;

#[derive(Debug)]
pub enum DashboardError {
    /// The cell is not part of the notebook (or not placed in the active view).
    UnknownCell(CellId),
    /// An action was forwarded while no dashboard instance exists.
    NotCreated,
    /// A layout method was invoked on a destroyed instance.
    Destroyed,
    /// The notebook document is not a usable nbformat document.
    InvalidNotebook(String),
    /// JSON (de)serialization error.
    Json(String),
}

impl fmt::Display for DashboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCell(id) => write!(f, "unknown cell: {id}"),
            Self::NotCreated => write!(f, "no dashboard is active"),
            Self::Destroyed => write!(f, "dashboard instance already destroyed"),
            Self::InvalidNotebook(msg) => write!(f, "invalid notebook: {msg}"),
            Self::Json(msg) => write!(f, "JSON error: {msg}"),
        }
    }
}

impl std::error::Error for DashboardError {}

impl From<serde_json::Error> for DashboardError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}
