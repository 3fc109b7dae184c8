//! Opaque JSON text stored verbatim in document columns.

use std::fmt;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde_json::Value;

/// Serialized JSON text as stored in a document column.
///
/// The store never validates the contents; any text round-trips unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JsonDocument(String);

impl JsonDocument {
    /// Wrap raw text without inspecting it.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Serialize a JSON value.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn from_value(value: &Value) -> serde_json::Result<Self> {
        serde_json::to_string(value).map(Self)
    }

    /// The literal `null`.
    #[must_use]
    pub fn null() -> Self {
        Self("null".to_string())
    }

    /// The literal `[]`.
    #[must_use]
    pub fn empty_array() -> Self {
        Self("[]".to_string())
    }

    /// Raw stored text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the raw stored text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    /// Parse the stored text.
    ///
    /// # Errors
    /// Returns an error if the text is not valid JSON.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.0)
    }

    /// Parse the stored text, falling back to a JSON string holding the raw text.
    #[must_use]
    pub fn to_value_lossy(&self) -> Value {
        self.to_value()
            .unwrap_or_else(|_| Value::String(self.0.clone()))
    }
}

impl fmt::Display for JsonDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ToSql for JsonDocument {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

// SQL NULL reads back as the `null` document.
impl FromSql for JsonDocument {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(Self::null()),
            other => String::column_result(other).map(Self),
        }
    }
}
