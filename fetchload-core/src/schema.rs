// Column inference and SQL identifier handling

use crate::error::StorageError;
use crate::record::Record;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;
use url::Url;

pub const FALLBACK_TABLE_NAME: &str = "records";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Real,
    Text,
}

impl Affinity {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Affinity::Integer => "INTEGER",
            Affinity::Real => "REAL",
            Affinity::Text => "TEXT",
        }
    }

    /// Affinity a single JSON value asks for; `None` for null.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Affinity::Integer),
            Value::Number(n) if n.is_i64() => Some(Affinity::Integer),
            Value::Number(_) => Some(Affinity::Real),
            Value::String(_) | Value::Array(_) | Value::Object(_) => Some(Affinity::Text),
        }
    }

    fn merge(self, other: Affinity) -> Affinity {
        match (self, other) {
            (a, b) if a == b => a,
            (Affinity::Integer, Affinity::Real) | (Affinity::Real, Affinity::Integer) => {
                Affinity::Real
            }
            _ => Affinity::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub affinity: Affinity,
}

/// Columns needed to hold a batch of records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    /// Union of all record keys in first-seen order, each typed from the
    /// values it holds across the batch. Keys differing only in ASCII case
    /// share one column, named by the first spelling seen.
    pub fn infer(records: &[Record]) -> Self {
        let mut names: Vec<String> = Vec::new();
        let mut affinities: Vec<Option<Affinity>> = Vec::new();

        for record in records {
            for (key, value) in record {
                let idx = match names.iter().position(|n| n.eq_ignore_ascii_case(key)) {
                    Some(idx) => idx,
                    None => {
                        names.push(key.clone());
                        affinities.push(None);
                        names.len() - 1
                    }
                };
                if let Some(seen) = Affinity::of(value) {
                    affinities[idx] = Some(match affinities[idx] {
                        Some(current) => current.merge(seen),
                        None => seen,
                    });
                }
            }
        }

        let columns = names
            .into_iter()
            .zip(affinities)
            .map(|(name, affinity)| Column {
                name,
                affinity: affinity.unwrap_or(Affinity::Text),
            })
            .collect();

        Schema { columns }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this schema. `unique` marks
    /// one column `UNIQUE` so it can serve as an upsert conflict target.
    pub fn create_table_sql(&self, table: &str, unique: Option<&str>) -> Result<String, StorageError> {
        let mut defs = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let mut def = format!("{} {}", quote_ident(&column.name)?, column.affinity.as_sql());
            if unique.is_some_and(|u| u.eq_ignore_ascii_case(&column.name)) {
                def.push_str(" UNIQUE");
            }
            defs.push(def);
        }
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(table)?,
            defs.join(", ")
        ))
    }
}

/// Value `record` holds for `column`, matching keys the way SQLite matches
/// identifiers (ASCII case-insensitive). An exact spelling wins.
pub fn field<'a>(record: &'a Record, column: &str) -> Option<&'a Value> {
    record.get(column).or_else(|| {
        record
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    })
}

/// Quote `name` as an SQLite identifier.
pub fn quote_ident(name: &str) -> Result<String, StorageError> {
    if name.is_empty() || name.contains('\0') {
        return Err(StorageError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Convert a JSON value to what gets bound into the row.
pub fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Table name taken from the last path segment of `url`.
pub fn default_table_name(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .unwrap_or("");

    let name: String = segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if name.is_empty() || name.chars().all(|c| c == '_') {
        FALLBACK_TABLE_NAME.to_string()
    } else {
        name
    }
}
