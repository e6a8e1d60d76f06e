//! Optional capability packs (database extensions).
//!
//! An [`ExtensionRegistry`] is built once from a list of pack names and then
//! handed to a SQL generator. It is never modified after construction.

use crate::error::{Result, SchemaError};

/// A database extension pack.
#[derive(Debug, PartialEq, Eq)]
pub struct ExtensionPack {
    /// Pack name as used in configuration.
    pub name: &'static str,
    /// Setup statement emitted in the schema preamble.
    pub setup: &'static str,
    /// Extra type aliases (lowercase schema type, SQL type).
    pub type_aliases: &'static [(&'static str, &'static str)],
    /// Default-value functions passed through unquoted.
    pub default_functions: &'static [&'static str],
}

const BUILTIN_PACKS: &[ExtensionPack] = &[
    ExtensionPack {
        name: "pgcrypto",
        setup: "CREATE EXTENSION IF NOT EXISTS \"pgcrypto\"",
        type_aliases: &[],
        default_functions: &["gen_random_uuid()", "gen_random_bytes(16)"],
    },
    ExtensionPack {
        name: "uuid-ossp",
        setup: "CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\"",
        type_aliases: &[],
        default_functions: &[
            "uuid_generate_v1()",
            "uuid_generate_v1mc()",
            "uuid_generate_v4()",
        ],
    },
    ExtensionPack {
        name: "postgis",
        setup: "CREATE EXTENSION IF NOT EXISTS \"postgis\"",
        type_aliases: &[
            ("geometry", "GEOMETRY"),
            ("geography", "GEOGRAPHY"),
            ("geopoint", "GEOGRAPHY(Point, 4326)"),
        ],
        default_functions: &[],
    },
    ExtensionPack {
        name: "citext",
        setup: "CREATE EXTENSION IF NOT EXISTS \"citext\"",
        type_aliases: &[("citext", "CITEXT")],
        default_functions: &[],
    },
    ExtensionPack {
        name: "vector",
        setup: "CREATE EXTENSION IF NOT EXISTS \"vector\"",
        type_aliases: &[("vector", "VECTOR"), ("embedding", "VECTOR(1536)")],
        default_functions: &[],
    },
];

/// Immutable set of enabled extension packs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionRegistry {
    packs: Vec<&'static ExtensionPack>,
}

impl ExtensionRegistry {
    /// Creates a registry with no packs enabled.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a registry from pack names.
    ///
    /// Names are matched case-insensitively; duplicates are enabled once.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut packs: Vec<&'static ExtensionPack> = Vec::new();
        for name in names {
            let name = name.as_ref();
            let pack = Self::builtin(name)
                .ok_or_else(|| SchemaError::UnknownExtension(name.to_string()))?;
            if !packs.iter().any(|p| p.name == pack.name) {
                packs.push(pack);
            }
        }
        Ok(Self { packs })
    }

    /// Looks up a built-in pack by name.
    #[must_use]
    pub fn builtin(name: &str) -> Option<&'static ExtensionPack> {
        BUILTIN_PACKS
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Returns the names of every built-in pack.
    pub fn builtin_names() -> impl Iterator<Item = &'static str> {
        BUILTIN_PACKS.iter().map(|p| p.name)
    }

    /// Returns the enabled packs in the order they were requested.
    #[must_use]
    pub fn packs(&self) -> &[&'static ExtensionPack] {
        &self.packs
    }

    /// Returns `true` if a pack with this name is enabled.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.packs.iter().any(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Returns the setup statements of the enabled packs.
    #[must_use]
    pub fn setup_statements(&self) -> Vec<String> {
        self.packs.iter().map(|p| p.setup.to_string()).collect()
    }

    /// Resolves a lowercase type name contributed by an enabled pack.
    #[must_use]
    pub fn type_alias(&self, name: &str) -> Option<&'static str> {
        self.packs
            .iter()
            .flat_map(|p| p.type_aliases.iter())
            .find(|(alias, _)| *alias == name)
            .map(|(_, sql)| *sql)
    }

    /// Returns `true` if a lowercase default expression is a function
    /// contributed by an enabled pack.
    #[must_use]
    pub fn is_default_function(&self, expr: &str) -> bool {
        self.packs
            .iter()
            .flat_map(|p| p.default_functions.iter())
            .any(|f| *f == expr)
    }
}
