//! Identifier validation and quoting for generated T-SQL.
//!
//! Identifiers cannot be bound as parameters, so every table, column, and
//! index name that ends up in a statement goes through [`quote_ident`].

use crate::catalog::TableName;
use crate::error::{DbError, Result};

/// SQL Server `sysname` limit.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Reject empty identifiers, embedded NUL bytes, and over-long names.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DbError::InvalidIdentifier(
            "identifier cannot be empty".to_string(),
        ));
    }
    if name.contains('\0') {
        return Err(DbError::InvalidIdentifier(format!(
            "identifier contains a null byte: {name:?}"
        )));
    }
    if name.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(DbError::InvalidIdentifier(format!(
            "identifier exceeds {MAX_IDENTIFIER_LENGTH} characters: {name:?}"
        )));
    }
    Ok(())
}

/// Bracket-quote an identifier, doubling any closing bracket.
pub fn quote_ident(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

/// `[schema].[table]`.
pub fn qualify(table: &TableName) -> Result<String> {
    Ok(format!(
        "{}.{}",
        quote_ident(&table.schema)?,
        quote_ident(&table.name)?
    ))
}

/// String literal with embedded quotes doubled; `unicode` adds the `N` prefix.
pub fn quote_literal(value: &str, unicode: bool) -> String {
    let escaped = value.replace('\'', "''");
    if unicode {
        format!("N'{escaped}'")
    } else {
        format!("'{escaped}'")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_and_escapes_brackets() {
        assert_eq!(quote_ident("Customer").ok().as_deref(), Some("[Customer]"));
        assert_eq!(quote_ident("odd]name").ok().as_deref(), Some("[odd]]name]"));
    }

    #[test]
    fn rejects_bad_identifiers() {
        assert!(quote_ident("").is_err());
        assert!(quote_ident("a\0b").is_err());
        assert!(quote_ident(&"x".repeat(129)).is_err());
    }

    #[test]
    fn qualifies_schema_and_table() {
        let table = TableName::new("sales", "Order Lines");
        assert_eq!(
            qualify(&table).ok().as_deref(),
            Some("[sales].[Order Lines]")
        );
    }

    #[test]
    fn literals_escape_quotes() {
        assert_eq!(quote_literal("O'Brien", true), "N'O''Brien'");
        assert_eq!(quote_literal("plain", false), "'plain'");
    }
}
