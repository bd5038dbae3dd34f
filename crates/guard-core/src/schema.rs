//! Table schema descriptors for the three source record types.
//!
//! Each descriptor is an ordered list of source → canonical column mappings
//! with a value kind and a requirement. The order of [`TableSchema::columns`]
//! is the canonical column order of the destination table.

use std::collections::HashSet;

use crate::error::{GuardError, Result};

/// Target representation of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    /// Money; may carry a `$` prefix and `,` thousands separators.
    Currency,
    Date,
    Timestamp,
    /// Two-valued flag.
    Flag,
}

impl ColumnKind {
    /// Human-readable name used in coercion errors.
    pub const fn describe(self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "number",
            ColumnKind::Currency => "currency amount",
            ColumnKind::Date => "date",
            ColumnKind::Timestamp => "timestamp",
            ColumnKind::Flag => "flag",
        }
    }
}

/// How the normalizer treats empty and unparseable values of a column.
///
/// * `Required`: an empty value drops the row; an unparseable value fails the
///   window with [`GuardError::ValueCoercion`].
/// * `Optional`: empty and unparseable values are both stored as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional,
}

/// One source → canonical column mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Header name in the source file.
    pub source: &'static str,
    /// Column name in the destination table.
    pub canonical: &'static str,
    pub kind: ColumnKind,
    pub requirement: Requirement,
}

impl ColumnSpec {
    const fn new(
        source: &'static str,
        canonical: &'static str,
        kind: ColumnKind,
        requirement: Requirement,
    ) -> Self {
        Self {
            source,
            canonical,
            kind,
            requirement,
        }
    }

    /// Same name in source and destination.
    const fn same(name: &'static str, kind: ColumnKind, requirement: Requirement) -> Self {
        Self::new(name, name, kind, requirement)
    }
}

/// A foreign key from a canonical column to another table's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references: &'static str,
    pub referenced_column: &'static str,
}

/// Schema descriptor for one destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    /// Destination table name.
    pub table: &'static str,
    /// Source file name inside the data directory.
    pub source_file: &'static str,
    /// Canonical name of the primary-key column.
    pub primary_key: &'static str,
    pub columns: &'static [ColumnSpec],
    pub foreign_keys: &'static [ForeignKey],
}

use ColumnKind::{Currency, Date, Flag, Float, Integer, Text, Timestamp};
use Requirement::{Optional, Required};

/// Users: identity, demographic and financial attributes.
pub const USERS: TableSchema = TableSchema {
    table: "users",
    source_file: "users_data.csv",
    primary_key: "user_id",
    columns: &[
        ColumnSpec::new("id", "user_id", Integer, Required),
        ColumnSpec::same("current_age", Integer, Optional),
        ColumnSpec::same("retirement_age", Integer, Optional),
        ColumnSpec::same("birth_year", Integer, Optional),
        ColumnSpec::same("birth_month", Integer, Optional),
        ColumnSpec::same("gender", Text, Optional),
        ColumnSpec::same("address", Text, Optional),
        ColumnSpec::same("latitude", Float, Optional),
        ColumnSpec::same("longitude", Float, Optional),
        ColumnSpec::same("per_capita_income", Currency, Required),
        ColumnSpec::same("yearly_income", Currency, Required),
        ColumnSpec::same("total_debt", Currency, Required),
        ColumnSpec::same("credit_score", Integer, Optional),
        ColumnSpec::same("num_credit_cards", Integer, Optional),
    ],
    foreign_keys: &[],
};

/// Cards: each owned by exactly one user.
pub const CARDS: TableSchema = TableSchema {
    table: "cards",
    source_file: "cards_data.csv",
    primary_key: "card_id",
    columns: &[
        ColumnSpec::new("id", "card_id", Integer, Required),
        ColumnSpec::new("client_id", "user_id", Integer, Required),
        ColumnSpec::same("card_brand", Text, Optional),
        ColumnSpec::same("card_type", Text, Optional),
        ColumnSpec::same("card_number", Text, Optional),
        ColumnSpec::same("expires", Date, Optional),
        ColumnSpec::same("cvv", Text, Optional),
        ColumnSpec::same("has_chip", Flag, Optional),
        ColumnSpec::same("num_cards_issued", Integer, Optional),
        ColumnSpec::same("credit_limit", Currency, Required),
        ColumnSpec::same("acct_open_date", Date, Optional),
        ColumnSpec::same("year_pin_last_changed", Integer, Optional),
        ColumnSpec::same("card_on_dark_web", Flag, Optional),
    ],
    foreign_keys: &[ForeignKey {
        column: "user_id",
        references: "users",
        referenced_column: "user_id",
    }],
};

/// Transactions: each tied to one user and one card.
pub const TRANSACTIONS: TableSchema = TableSchema {
    table: "transactions",
    source_file: "transactions_data.csv",
    primary_key: "transaction_id",
    columns: &[
        ColumnSpec::new("id", "transaction_id", Integer, Required),
        ColumnSpec::new("client_id", "user_id", Integer, Required),
        ColumnSpec::same("card_id", Integer, Required),
        ColumnSpec::same("date", Timestamp, Optional),
        ColumnSpec::same("amount", Currency, Required),
        ColumnSpec::same("use_chip", Flag, Optional),
        ColumnSpec::same("merchant_id", Integer, Optional),
        ColumnSpec::same("merchant_city", Text, Optional),
        ColumnSpec::same("merchant_state", Text, Optional),
        ColumnSpec::same("zip", Text, Optional),
        ColumnSpec::same("mcc", Integer, Optional),
        ColumnSpec::same("errors", Text, Optional),
    ],
    foreign_keys: &[
        ForeignKey {
            column: "user_id",
            references: "users",
            referenced_column: "user_id",
        },
        ForeignKey {
            column: "card_id",
            references: "cards",
            referenced_column: "card_id",
        },
    ],
};

/// All tables in load order (referenced tables first).
pub const ALL_TABLES: [&TableSchema; 3] = [&USERS, &CARDS, &TRANSACTIONS];

impl TableSchema {
    /// Canonical column names in destination order.
    pub fn canonical_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.canonical)
    }

    /// Look up a column by canonical name.
    pub fn column(&self, canonical: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.canonical == canonical)
    }

    /// Check the descriptor is internally consistent.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| GuardError::InvalidSchema {
            table: self.table.to_string(),
            reason,
        };

        if self.columns.is_empty() {
            return Err(invalid("no columns".to_string()));
        }

        let mut sources = HashSet::new();
        let mut canonicals = HashSet::new();
        for col in self.columns {
            if col.source.is_empty() || col.canonical.is_empty() {
                return Err(invalid("empty column name".to_string()));
            }
            if !sources.insert(col.source) {
                return Err(invalid(format!("duplicate source column `{}`", col.source)));
            }
            if !canonicals.insert(col.canonical) {
                return Err(invalid(format!(
                    "duplicate canonical column `{}`",
                    col.canonical
                )));
            }
        }

        match self.column(self.primary_key) {
            None => {
                return Err(invalid(format!(
                    "primary key `{}` is not a column",
                    self.primary_key
                )))
            }
            Some(pk) if pk.requirement != Requirement::Required => {
                return Err(invalid(format!(
                    "primary key `{}` must be required",
                    self.primary_key
                )))
            }
            Some(_) => {}
        }

        for fk in self.foreign_keys {
            if self.column(fk.column).is_none() {
                return Err(invalid(format!(
                    "foreign key column `{}` is not a column",
                    fk.column
                )));
            }
        }

        Ok(())
    }
}

/// Validate every built-in descriptor, including cross-table references.
pub fn validate_all() -> Result<()> {
    for (idx, schema) in ALL_TABLES.iter().enumerate() {
        schema.validate()?;
        for fk in schema.foreign_keys {
            // Referenced tables must be loaded earlier.
            let target = ALL_TABLES[..idx]
                .iter()
                .find(|t| t.table == fk.references)
                .ok_or_else(|| GuardError::InvalidSchema {
                    table: schema.table.to_string(),
                    reason: format!("references unknown or later table `{}`", fk.references),
                })?;
            if target.primary_key != fk.referenced_column {
                return Err(GuardError::InvalidSchema {
                    table: schema.table.to_string(),
                    reason: format!(
                        "`{}` references {}.{}, which is not its primary key",
                        fk.column, fk.references, fk.referenced_column
                    ),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_schemas_validate() {
        validate_all().expect("built-in schemas must be valid");
    }

    #[test]
    fn test_canonical_order_matches_columns() {
        let names: Vec<&str> = USERS.canonical_names().collect();
        assert_eq!(names.first(), Some(&"user_id"));
        assert_eq!(names.last(), Some(&"num_credit_cards"));
        assert_eq!(names.len(), 14);
    }

    #[test]
    fn test_id_columns_are_renamed() {
        assert_eq!(CARDS.column("user_id").map(|c| c.source), Some("client_id"));
        assert_eq!(
            TRANSACTIONS.column("transaction_id").map(|c| c.source),
            Some("id")
        );
    }

    #[test]
    fn test_money_required_dates_optional() {
        for schema in ALL_TABLES {
            for col in schema.columns {
                match col.kind {
                    ColumnKind::Currency => assert_eq!(col.requirement, Requirement::Required),
                    ColumnKind::Date | ColumnKind::Timestamp => {
                        assert_eq!(col.requirement, Requirement::Optional)
                    }
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn test_validate_rejects_duplicate_canonical() {
        const BAD: TableSchema = TableSchema {
            table: "bad",
            source_file: "bad.csv",
            primary_key: "id",
            columns: &[
                ColumnSpec::same("id", ColumnKind::Integer, Requirement::Required),
                ColumnSpec::new("other", "id", ColumnKind::Text, Requirement::Optional),
            ],
            foreign_keys: &[],
        };
        let err = BAD.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate canonical column `id`"));
    }

    #[test]
    fn test_validate_rejects_optional_primary_key() {
        const BAD: TableSchema = TableSchema {
            table: "bad",
            source_file: "bad.csv",
            primary_key: "id",
            columns: &[ColumnSpec::same("id", ColumnKind::Integer, Requirement::Optional)],
            foreign_keys: &[],
        };
        let err = BAD.validate().unwrap_err();
        assert!(err.to_string().contains("must be required"));
    }

    #[test]
    fn test_validate_rejects_missing_fk_column() {
        const BAD: TableSchema = TableSchema {
            table: "bad",
            source_file: "bad.csv",
            primary_key: "id",
            columns: &[ColumnSpec::same("id", ColumnKind::Integer, Requirement::Required)],
            foreign_keys: &[ForeignKey {
                column: "user_id",
                references: "users",
                referenced_column: "user_id",
            }],
        };
        assert!(matches!(
            BAD.validate(),
            Err(GuardError::InvalidSchema { .. })
        ));
    }
}
