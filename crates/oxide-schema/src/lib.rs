//! Schema model, differ and SQL generation for schema-driven migrations.
//!
//! `oxide-schema` is the pure half of the migration engine. It performs no
//! I/O:
//!
//! - **Schema** - Tables, fields, indexes and references describing a database
//! - **Differ** - Computes the ordered changes between two schemas
//! - **Dialect** - Renders schemas and changes as SQL for one database engine
//! - **State** - Replays changes onto a schema
//!
//! # Example
//!
//! ```rust
//! use oxide_schema::prelude::*;
//!
//! let old = Schema::new().table(
//!     Table::new("users")
//!         .field(Field::new("id", "uuid").primary_key())
//!         .field(Field::new("email", "varchar(255)").unique().not_null()),
//! );
//! let new = old
//!     .clone()
//!     .index(Index::new("users", ["email"]));
//!
//! let generator = generator_for(Dialect::Postgres, ExtensionRegistry::empty()).unwrap();
//! let changes = Differ::new(generator.as_ref()).compare(&old, &new);
//!
//! assert_eq!(
//!     generator.render_changes(&changes),
//!     "-- Create index 'idx_users_email' on table 'users'\n\
//!      CREATE INDEX idx_users_email ON users (email);\n"
//! );
//! ```

pub mod change;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod extension;
pub mod schema;
pub mod state;
pub mod validate;

pub use error::{Result, SchemaError};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::change::{AlterAction, Change, ChangeKind, ChangePhase};
    pub use crate::dialect::{
        generator_for, Dialect, PostgresGenerator, SqlGenerator, SqliteGenerator,
    };
    pub use crate::diff::Differ;
    pub use crate::error::{Result, SchemaError};
    pub use crate::extension::{ExtensionPack, ExtensionRegistry};
    pub use crate::schema::{
        Endpoint, Field, Index, Reference, ReferentialAction, RelationKind, Schema, Table,
    };
    pub use crate::state::SchemaState;
    pub use crate::validate::validate;
}
