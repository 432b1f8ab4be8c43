//! Table lookup over sheet-style rows.

use crate::bricks::{Brick, BrickOptions, CapabilityScope};
use crate::core::BrickKind;
use crate::errors::{BrickflowError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
struct LookupArgs {
    rows: Vec<Value>,
    header: String,
    query: Value,
    #[serde(default)]
    multi: bool,
}

/// Finds rows whose `header` column equals `query`.
///
/// `rows` is either a header row followed by value rows, or a list of
/// objects. With `multi` every match is returned, otherwise only the first
/// (or `null`).
#[derive(Debug, Clone, Copy, Default)]
pub struct LookupBrick;

impl LookupBrick {
    /// Registry id.
    pub const ID: &'static str = "@brickflow/data/lookup";
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn cells_match(cell: &Value, query: &Value) -> bool {
    cell == query || cell_text(cell) == cell_text(query)
}

/// Converts header + value rows into objects keyed by header.
fn rows_to_records(rows: Vec<Value>) -> Result<Vec<Map<String, Value>>> {
    let mut rows = rows.into_iter();
    let Some(first) = rows.next() else {
        return Ok(Vec::new());
    };

    match first {
        Value::Object(record) => {
            let mut records = vec![record];
            for row in rows {
                match row {
                    Value::Object(record) => records.push(record),
                    other => {
                        return Err(BrickflowError::prop("Expected an object row", "rows", other))
                    }
                }
            }
            Ok(records)
        }
        Value::Array(headers) => {
            let headers: Vec<String> = headers.iter().map(cell_text).collect();
            rows.map(|row| match row {
                Value::Array(cells) => Ok(headers
                    .iter()
                    .cloned()
                    .zip(cells.into_iter().chain(std::iter::repeat(Value::Null)))
                    .collect()),
                other => Err(BrickflowError::prop("Expected an array row", "rows", other)),
            })
            .collect()
        }
        other => Err(BrickflowError::prop("Expected a header row", "rows", other)),
    }
}

#[async_trait]
impl Brick for LookupBrick {
    fn id(&self) -> &str {
        Self::ID
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Transformer
    }

    async fn is_pure(&self, _scope: &CapabilityScope<'_>) -> Result<bool> {
        Ok(true)
    }

    async fn run(&self, args: Value, _options: &BrickOptions) -> Result<Value> {
        let LookupArgs {
            rows,
            header,
            query,
            multi,
        } = serde_json::from_value(args.clone())
            .map_err(|e| BrickflowError::prop(format!("Invalid lookup arguments: {e}"), "args", args))?;

        let records = rows_to_records(rows)?;
        if let Some(first) = records.first() {
            if !first.contains_key(&header) {
                return Err(BrickflowError::prop(
                    format!("Unknown column: {header}"),
                    "header",
                    Value::String(header),
                ));
            }
        }

        let mut matches = records
            .into_iter()
            .filter(|record| record.get(&header).is_some_and(|cell| cells_match(cell, &query)))
            .map(Value::Object);

        if multi {
            Ok(Value::Array(matches.collect()))
        } else {
            Ok(matches.next().unwrap_or(Value::Null))
        }
    }
}
