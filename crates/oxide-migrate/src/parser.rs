//! Schema source parsing.
//!
//! The manager reads the desired schema through a [`SchemaParser`]. The
//! bundled [`JsonSchemaParser`] reads the schema model from JSON.

use oxide_schema::schema::Schema;

/// Error returned by a schema parser.
pub type ParseError = Box<dyn std::error::Error + Send + Sync>;

/// Turns schema source text into a [`Schema`].
///
/// Parsing must be deterministic: the same source always yields a
/// structurally identical schema.
pub trait SchemaParser: Send + Sync {
    /// File extension of the schema source, without the dot.
    fn extension(&self) -> &'static str;

    /// Parses schema source text.
    fn parse(&self, source: &str) -> std::result::Result<Schema, ParseError>;
}

/// Parses schemas written as JSON with camelCase keys.
///
/// ```json
/// {
///   "tables": [{
///     "name": "users",
///     "fields": [
///       {"name": "id", "type": "uuid", "primaryKey": true},
///       {"name": "email", "type": "varchar(255)", "unique": true, "notNull": true}
///     ]
///   }]
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaParser;

impl SchemaParser for JsonSchemaParser {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn parse(&self, source: &str) -> std::result::Result<Schema, ParseError> {
        Ok(serde_json::from_str(source)?)
    }
}
