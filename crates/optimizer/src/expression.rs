//! Computed-expression descriptors
//!
//! Expressions are data, not callables. The planner carries them from the
//! walker to the store untouched; only the store renders them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A computed field attached to a query as a named annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expression {
    /// Reference to a column, possibly through a dotted relation path
    Column { path: String },
    /// Constant value
    Literal { value: Value },
    /// SQL function call
    Function { name: String, args: Vec<Expression> },
    /// Number of related rows reachable through a relation
    Count { relation: String, distinct: bool },
    /// Number of rows sharing a partition key in the same result set
    WindowCount { partition_by: String },
    /// Raw SQL fragment
    Raw { sql: String },
}

impl Expression {
    pub fn column(path: impl Into<String>) -> Self {
        Self::Column { path: path.into() }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    pub fn function(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self::Function {
            name: name.into(),
            args,
        }
    }

    pub fn count(relation: impl Into<String>) -> Self {
        Self::Count {
            relation: relation.into(),
            distinct: false,
        }
    }

    pub fn count_distinct(relation: impl Into<String>) -> Self {
        Self::Count {
            relation: relation.into(),
            distinct: true,
        }
    }

    pub fn window_count(partition_by: impl Into<String>) -> Self {
        Self::WindowCount {
            partition_by: partition_by.into(),
        }
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw { sql: sql.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expression_descriptor_is_tagged() {
        let expr = Expression::function(
            "CONCAT",
            vec![Expression::column("street_address"), Expression::literal(", ")],
        );
        let encoded = serde_json::to_value(&expr).unwrap();
        assert_eq!(encoded["kind"], json!("function"));
        assert_eq!(encoded["args"][0]["kind"], json!("column"));
        assert_eq!(encoded["args"][0]["path"], json!("street_address"));

        let decoded: Expression = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, expr);
    }

    #[test]
    fn test_count_constructors() {
        assert_eq!(
            Expression::count_distinct("sales"),
            Expression::Count {
                relation: "sales".to_string(),
                distinct: true
            }
        );
    }
}
