use crate::model::CacheEntry;
use sqlparser::dialect::{BigQueryDialect, Dialect, GenericDialect, PostgreSqlDialect, SnowflakeDialect};
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SqlCheckError {
    #[error("Unknown SQL dialect: {0}")]
    UnknownDialect(String),

    #[error("Invalid SQL in {fragment}: {reason}")]
    InvalidFragment { fragment: String, reason: String },
}

/// Dialect the cached SQL fragments are expected to be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Generic,
    Postgres,
    BigQuery,
    Snowflake,
}

impl SqlDialect {
    fn dialect(&self) -> Box<dyn Dialect> {
        match self {
            SqlDialect::Generic => Box::new(GenericDialect {}),
            SqlDialect::Postgres => Box::new(PostgreSqlDialect {}),
            SqlDialect::BigQuery => Box::new(BigQueryDialect {}),
            SqlDialect::Snowflake => Box::new(SnowflakeDialect {}),
        }
    }
}

impl FromStr for SqlDialect {
    type Err = SqlCheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "generic" => Ok(SqlDialect::Generic),
            "postgres" | "postgresql" => Ok(SqlDialect::Postgres),
            "bigquery" => Ok(SqlDialect::BigQuery),
            "snowflake" => Ok(SqlDialect::Snowflake),
            _ => Err(SqlCheckError::UnknownDialect(s.to_string())),
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlDialect::Generic => "generic",
            SqlDialect::Postgres => "postgres",
            SqlDialect::BigQuery => "bigquery",
            SqlDialect::Snowflake => "snowflake",
        };
        write!(f, "{}", name)
    }
}

/// Syntactic check of the SQL fragments in a semantic layer.
///
/// Each metric and dimension `sql` and each join predicate must parse as a
/// single expression. Nothing is resolved against a schema.
#[derive(Debug, Clone, Copy)]
pub struct SqlCheck {
    dialect: SqlDialect,
}

impl SqlCheck {
    pub fn new(dialect: SqlDialect) -> Self {
        SqlCheck { dialect }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn check_entry(&self, entry: &CacheEntry) -> Result<(), SqlCheckError> {
        let layer = &entry.semantic_layer_json;
        for metric in &layer.metrics {
            self.check_expression(&format!("metric `{}`", metric.name), &metric.sql)?;
        }
        for dimension in &layer.dimensions {
            self.check_expression(&format!("dimension `{}`", dimension.name), &dimension.sql)?;
        }
        for join in &layer.joins {
            self.check_expression(
                &format!("join `{}` -> `{}`", join.one, join.many),
                &join.join,
            )?;
        }
        Ok(())
    }

    pub fn check_expression(&self, fragment: &str, sql: &str) -> Result<(), SqlCheckError> {
        let invalid = |reason: String| SqlCheckError::InvalidFragment {
            fragment: fragment.to_string(),
            reason,
        };

        let dialect = self.dialect.dialect();
        let mut parser = Parser::new(dialect.as_ref())
            .try_with_sql(sql)
            .map_err(|e| invalid(e.to_string()))?;
        parser.parse_expr().map_err(|e| invalid(e.to_string()))?;

        let next = parser.peek_token();
        if next.token != Token::EOF {
            return Err(invalid(format!("unexpected trailing input at {}", next)));
        }
        Ok(())
    }
}
