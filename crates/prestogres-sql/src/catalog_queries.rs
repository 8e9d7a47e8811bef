// SPDX-License-Identifier: Apache-2.0

//! Catalog queries run during a sync.

/// Remote catalog scan. Column order is relied upon when grouping rows.
pub const REMOTE_COLUMNS_SQL: &str = "select table_schema, table_name, column_name, is_nullable, data_type \
     from information_schema.columns";

/// Every local schema name. Protection is decided by the caller.
pub const LOCAL_SCHEMAS_SQL: &str = "select n.nspname::text as schema_name \
     from pg_catalog.pg_namespace n \
     order by n.nspname";

/// Every local base table (no views, indexes, sequences) with its schema.
pub const LOCAL_BASE_TABLES_SQL: &str = "select n.nspname::text as schema_name, c.relname::text as table_name \
     from pg_catalog.pg_class c \
     join pg_catalog.pg_namespace n on n.oid = c.relnamespace \
     where c.relkind in ('r') \
     order by n.nspname, c.relname";
