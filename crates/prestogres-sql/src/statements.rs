// SPDX-License-Identifier: Apache-2.0

//! Statement builders
//!
//! Identifiers are quoted through the caller-supplied `quote` function so the
//! local executor stays the single authority on identifier safety. Values
//! never appear in generated text; they travel as bind parameters.

use prestogres_core::{ColumnDescriptor, LocalType};

/// PostgreSQL's limit on bind parameters in one statement.
pub const MAX_BIND_PARAMETERS: usize = 65535;

/// `create temp table "t" (...)` for a materialized result.
pub fn create_temp_table(
    quote: &dyn Fn(&str) -> String,
    table: &str,
    columns: &[ColumnDescriptor],
    types: &[LocalType],
) -> String {
    let defs: Vec<String> = columns
        .iter()
        .zip(types)
        .map(|(column, ty)| format!("{} {}", quote(&column.name), ty))
        .collect();

    format!("create temp table {} (\n  {}\n)", quote(table), defs.join(",\n  "))
}

/// `create table "s"."t" (...)` for a mirrored catalog table, carrying the
/// source nullability.
pub fn create_mirror_table(
    quote: &dyn Fn(&str) -> String,
    schema: &str,
    table: &str,
    columns: &[(ColumnDescriptor, LocalType)],
) -> String {
    let defs: Vec<String> = columns
        .iter()
        .map(|(column, ty)| {
            let mut def = format!("{} {}", quote(&column.name), ty);
            if !column.nullable {
                def.push_str(" not null");
            }
            def
        })
        .collect();

    format!(
        "create table {}.{} (\n  {}\n)",
        quote(schema),
        quote(table),
        defs.join(",\n  ")
    )
}

pub fn create_schema_if_not_exists(quote: &dyn Fn(&str) -> String, schema: &str) -> String {
    format!("create schema if not exists {}", quote(schema))
}

pub fn drop_schema_cascade(quote: &dyn Fn(&str) -> String, schema: &str) -> String {
    format!("drop schema {} cascade", quote(schema))
}

pub fn drop_table(quote: &dyn Fn(&str) -> String, schema: &str, table: &str) -> String {
    format!("drop table {}.{}", quote(schema), quote(table))
}

pub fn drop_table_if_exists(quote: &dyn Fn(&str) -> String, schema: &str, table: &str) -> String {
    format!("drop table if exists {}.{}", quote(schema), quote(table))
}

/// Reusable multi-row INSERT for one temp table.
///
/// The column list is rendered once; the `values` groups are expanded per
/// batch with strictly increasing placeholders, row-major.
#[derive(Debug, Clone)]
pub struct InsertTemplate {
    prefix: String,
    column_types: Vec<LocalType>,
}

impl InsertTemplate {
    pub fn new(
        quote: &dyn Fn(&str) -> String,
        table: &str,
        columns: &[ColumnDescriptor],
        column_types: Vec<LocalType>,
    ) -> Self {
        let names: Vec<String> = columns.iter().map(|c| quote(&c.name)).collect();
        let prefix = format!(
            "insert into {} (\n  {}\n) values\n",
            quote(table),
            names.join(",\n  ")
        );
        Self { prefix, column_types }
    }

    pub fn column_count(&self) -> usize {
        self.column_types.len()
    }

    /// Largest row count whose placeholders fit in one statement.
    pub fn max_rows_per_statement(&self) -> usize {
        MAX_BIND_PARAMETERS / self.column_count().max(1)
    }

    /// Statement text for exactly `rows` rows.
    pub fn render(&self, rows: usize) -> String {
        let width = self.column_count();
        let mut sql = String::with_capacity(self.prefix.len() + rows * width * 6);
        sql.push_str(&self.prefix);

        for row in 0..rows {
            if row > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            for col in 0..width {
                if col > 0 {
                    sql.push_str(", ");
                }
                sql.push('$');
                sql.push_str(&(row * width + col + 1).to_string());
            }
            sql.push(')');
        }

        sql
    }

    /// Parameter types for `rows` rows: the column types repeated per row.
    pub fn param_types(&self, rows: usize) -> Vec<LocalType> {
        let mut types = Vec::with_capacity(rows * self.column_count());
        for _ in 0..rows {
            types.extend_from_slice(&self.column_types);
        }
        types
    }
}
