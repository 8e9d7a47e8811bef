// SPDX-License-Identifier: Apache-2.0

//! SQL text generation for the bridge: temp table and mirror DDL, the
//! batched INSERT template, and the catalog queries both sides run.

pub mod catalog_queries;
pub mod statements;

pub use statements::{
    create_mirror_table, create_schema_if_not_exists, create_temp_table, drop_schema_cascade,
    drop_table, drop_table_if_exists, InsertTemplate, MAX_BIND_PARAMETERS,
};
