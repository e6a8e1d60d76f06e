//! Error types for schema validation and SQL generation.

/// Errors raised while validating, diffing or rendering a schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Two tables share a name.
    #[error("Duplicate table '{0}'")]
    DuplicateTable(String),

    /// A table has no fields.
    #[error("Table '{0}' has no fields")]
    EmptyTable(String),

    /// A field name is empty.
    #[error("Table '{0}' has a field with an empty name")]
    EmptyFieldName(String),

    /// Two fields of one table share a name.
    #[error("Duplicate field '{field}' in table '{table}'")]
    DuplicateField {
        /// Table name.
        table: String,
        /// Field name.
        field: String,
    },

    /// A reference points at a table or column that doesn't exist.
    #[error("Reference '{reference}' points at missing column '{table}.{column}'")]
    DanglingReference {
        /// Reference name (explicit or derived).
        reference: String,
        /// Missing table.
        table: String,
        /// Missing column.
        column: String,
    },

    /// An index covers a table or column that doesn't exist.
    #[error("Index '{index}' covers missing column '{table}.{column}'")]
    UnknownIndexColumn {
        /// Index name (explicit or derived).
        index: String,
        /// Table name.
        table: String,
        /// Missing column.
        column: String,
    },

    /// An index lists no columns.
    #[error("Index '{0}' has no columns")]
    EmptyIndex(String),

    /// The requested dialect has no generator.
    #[error("SQL dialect '{0}' is not supported")]
    UnsupportedDialect(String),

    /// An extension pack name is not known to the registry.
    #[error("Unknown extension '{0}'")]
    UnknownExtension(String),

    /// A change could not be replayed onto a schema.
    #[error("Invalid schema state: {0}")]
    InvalidState(String),
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
