use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cell_id::CellId;
use crate::error::DashboardError;

/// nbformat cell type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Code,
    Markdown,
    Raw,
}

impl CellKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellKind::Code => "code",
            CellKind::Markdown => "markdown",
            CellKind::Raw => "raw",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "code" => Some(CellKind::Code),
            "markdown" => Some(CellKind::Markdown),
            "raw" => Some(CellKind::Raw),
            _ => None,
        }
    }
}

/// A notebook cell.
///
/// Only the fields the dashboard needs are lifted out of the nbformat
/// object; everything else (outputs, execution_count, attachments, the
/// nbformat `id`) stays in `extra` and is written back untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    id: CellId,
    pub kind: CellKind,
    pub source: String,
    metadata: Map<String, Value>,
    extra: Map<String, Value>,
}

impl Cell {
    pub fn new(id: CellId, kind: CellKind, source: impl Into<String>) -> Self {
        let mut extra = Map::new();
        if kind == CellKind::Code {
            extra.insert("outputs".into(), Value::Array(Vec::new()));
            extra.insert("execution_count".into(), Value::Null);
        }
        Self {
            id,
            kind,
            source: source.into(),
            metadata: Map::new(),
            extra,
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.metadata
    }

    /// Parse an nbformat cell object.
    pub fn from_json(id: CellId, value: Value) -> Result<Self, DashboardError> {
        let Value::Object(mut obj) = value else {
            return Err(DashboardError::InvalidNotebook(format!("{id} is not an object")));
        };

        let kind = obj
            .remove("cell_type")
            .as_ref()
            .and_then(Value::as_str)
            .and_then(CellKind::parse)
            .ok_or_else(|| DashboardError::InvalidNotebook(format!("{id} has no valid cell_type")))?;

        let source = match obj.remove("source") {
            Some(Value::String(s)) => s,
            Some(Value::Array(lines)) => lines
                .iter()
                .filter_map(Value::as_str)
                .collect::<String>(),
            _ => String::new(),
        };

        let metadata = match obj.remove("metadata") {
            Some(Value::Object(m)) => m,
            _ => Map::new(),
        };

        Ok(Self { id, kind, source, metadata, extra: obj })
    }

    /// Serialize back to an nbformat cell object (source as a line list).
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("cell_type".into(), Value::String(self.kind.as_str().into()));
        obj.insert("metadata".into(), Value::Object(self.metadata.clone()));
        obj.insert("source".into(), Value::Array(split_source(&self.source)));
        for (k, v) in &self.extra {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }

    /// Number of source lines (an empty cell still occupies one line).
    pub fn line_count(&self) -> usize {
        self.source.lines().count().max(1)
    }

    /// Length in chars of the longest source line.
    pub fn longest_line(&self) -> usize {
        self.source.lines().map(|l| l.chars().count()).max().unwrap_or(0)
    }

    /// Lines of text the stored outputs would render (stream text and
    /// `text/plain` data; rich outputs count as one line).
    pub fn output_line_count(&self) -> usize {
        let Some(outputs) = self.extra.get("outputs").and_then(Value::as_array) else {
            return 0;
        };
        outputs
            .iter()
            .map(|out| {
                let text = out
                    .get("text")
                    .or_else(|| out.get("data").and_then(|d| d.get("text/plain")));
                match text {
                    Some(Value::String(s)) => s.lines().count(),
                    Some(Value::Array(lines)) => lines.len(),
                    _ => 1,
                }
            })
            .sum()
    }
}

fn split_source(source: &str) -> Vec<Value> {
    source
        .split_inclusive('\n')
        .map(|line| Value::String(line.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_joins_source_lines() {
        let cell = Cell::from_json(
            CellId::from_raw(0),
            json!({"cell_type": "code", "source": ["a = 1\n", "print(a)"], "metadata": {}, "outputs": []}),
        )
        .unwrap();
        assert_eq!(cell.kind, CellKind::Code);
        assert_eq!(cell.source, "a = 1\nprint(a)");
        assert_eq!(cell.line_count(), 2);
        assert_eq!(cell.longest_line(), 8);
    }

    #[test]
    fn test_unknown_fields_survive_roundtrip() {
        let original = json!({
            "cell_type": "code",
            "execution_count": 3,
            "id": "abc",
            "metadata": {"tags": ["x"]},
            "outputs": [{"output_type": "stream", "name": "stdout", "text": ["1\n", "2\n"]}],
            "source": ["x\n", "y"]
        });
        let cell = Cell::from_json(CellId::from_raw(0), original.clone()).unwrap();
        assert_eq!(cell.to_json(), original);
        assert_eq!(cell.output_line_count(), 2);
    }

    #[test]
    fn test_missing_cell_type_is_rejected() {
        let err = Cell::from_json(CellId::from_raw(4), json!({"source": "x"})).unwrap_err();
        assert!(err.to_string().contains("cell#4"));
    }

    #[test]
    fn test_empty_cell_has_one_line() {
        let cell = Cell::new(CellId::from_raw(0), CellKind::Markdown, "");
        assert_eq!(cell.line_count(), 1);
        assert_eq!(cell.longest_line(), 0);
        assert_eq!(cell.output_line_count(), 0);
    }
}
