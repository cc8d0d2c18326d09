//! SQL generation for [`SelectQuery`]
//!
//! A windowed query numbers its rows per partition in a subquery and keeps
//! one page of rows per partition in the outer query, so every parent's page
//! of children comes back in a single statement.

use serde_json::Value;

use super::select::{format_value, quote, SelectQuery};
use super::types::*;
use crate::node::{join_path, PageWindow, PATH_SEPARATOR};

const ROW_NUMBER_ALIAS: &str = "_row_number";
const WINDOW_TABLE_ALIAS: &str = "_windowed";

/// One statement of a query tree, addressed by its relation path from the root
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStatement {
    /// Empty for the root statement
    pub path: String,
    pub sql: String,
}

impl SelectQuery {
    /// Generate the SQL for this query, follow-ups excluded
    pub fn to_sql(&self) -> String {
        match &self.window {
            Some(window) => self.build_windowed_sql(window),
            None => {
                let mut sql = self.build_base_sql(None);
                self.build_order_limit_clause(&mut sql);
                sql
            }
        }
    }

    /// This query and every follow-up, depth first
    pub fn statements(&self) -> Vec<QueryStatement> {
        let mut statements = vec![QueryStatement {
            path: String::new(),
            sql: self.to_sql(),
        }];

        for follow_up in &self.follow_ups {
            for nested in follow_up.query.statements() {
                let path = if nested.path.is_empty() {
                    follow_up.path.clone()
                } else {
                    join_path(&follow_up.path, &nested.path)
                };
                statements.push(QueryStatement {
                    path,
                    sql: nested.sql,
                });
            }
        }
        statements
    }

    fn build_windowed_sql(&self, window: &PageWindow) -> String {
        let order = if !window.order_by.is_empty() {
            window.order_by.clone()
        } else if !self.order_by.is_empty() {
            self.order_by.clone()
        } else {
            vec![(self.primary_key.clone(), OrderDirection::Asc)]
        };
        let order_clauses: Vec<String> = order
            .iter()
            .map(|(column, direction)| format!("{} {}", self.qualify(column), direction))
            .collect();

        let row_number = format!(
            "ROW_NUMBER() OVER (PARTITION BY {} ORDER BY {}) AS {}",
            self.qualify(&window.partition_by),
            order_clauses.join(", "),
            quote(ROW_NUMBER_ALIAS),
        );

        let inner = self.build_base_sql(Some(row_number));
        let row_number_column =
            format!("{}.{}", quote(WINDOW_TABLE_ALIAS), quote(ROW_NUMBER_ALIAS));

        // Pages come back grouped by parent, in window order within each
        format!(
            "SELECT * FROM ({}) AS {} WHERE {} > {} AND {} <= {} ORDER BY {}.{}, {}",
            inner,
            quote(WINDOW_TABLE_ALIAS),
            row_number_column,
            window.lower_bound(),
            row_number_column,
            window.upper_bound(),
            quote(WINDOW_TABLE_ALIAS),
            quote(&window.partition_by),
            row_number_column,
        )
    }

    /// SELECT ... FROM ... JOIN ... WHERE ...
    fn build_base_sql(&self, extra_column: Option<String>) -> String {
        let mut sql = String::from("SELECT ");

        let mut projection = self.projection();
        projection.extend(extra_column);
        sql.push_str(&projection.join(", "));

        // FROM clause
        sql.push_str(" FROM ");
        sql.push_str(&quote(&self.table));

        // JOIN clauses
        for join in &self.joins {
            sql.push_str(&format!(
                " LEFT JOIN {} AS {} ON {} = {}",
                quote(&join.table),
                quote(&join.alias),
                join.on_condition.0,
                join.on_condition.1
            ));
        }

        // WHERE clause
        if !self.where_conditions.is_empty() {
            sql.push_str(" WHERE ");
            let conditions = self.build_where_conditions(&self.where_conditions);
            sql.push_str(&conditions.join(" AND "));
        }

        sql
    }

    fn projection(&self) -> Vec<String> {
        let mut columns = Vec::new();

        if self.select_fields.is_empty() {
            columns.push(format!("{}.*", quote(&self.table)));
        } else {
            if !self.select_fields.contains(&self.primary_key) {
                columns.push(self.qualify(&self.primary_key));
            }
            for field in &self.select_fields {
                if field.contains(PATH_SEPARATOR) {
                    columns.push(format!("{} AS {}", self.qualify(field), quote(field)));
                } else {
                    columns.push(self.qualify(field));
                }
            }
        }

        for (name, computed) in &self.computed {
            columns.push(format!("{} AS {}", computed.sql, quote(name)));
        }
        columns
    }

    fn build_order_limit_clause(&self, sql: &mut String) {
        // ORDER BY clause
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let order_clauses: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{} {}", self.qualify(column), direction))
                .collect();
            sql.push_str(&order_clauses.join(", "));
        }

        // LIMIT clause
        if let Some(limit) = self.limit_count {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
    }

    /// Build WHERE condition strings
    fn build_where_conditions(&self, conditions: &[WhereCondition]) -> Vec<String> {
        conditions
            .iter()
            .map(|condition| {
                let column = self.qualify(&condition.column);
                match &condition.operator {
                    QueryOperator::IsNull => format!("{} {}", column, condition.operator),
                    QueryOperator::In => {
                        let values: Vec<String> =
                            condition.values.iter().map(format_value).collect();
                        if values.is_empty() {
                            // Nothing can match an empty list
                            "1 = 0".to_string()
                        } else {
                            format!("{} IN ({})", column, values.join(", "))
                        }
                    }
                    _ => {
                        let value = condition.value.as_ref().unwrap_or(&Value::Null);
                        format!("{} {} {}", column, condition.operator, format_value(value))
                    }
                }
            })
            .collect()
    }
}
