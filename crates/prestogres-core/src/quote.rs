// SPDX-License-Identifier: Apache-2.0

//! PostgreSQL identifier quoting.

/// Quotes an identifier, doubling embedded quotes.
///
/// Always quotes so mixed-case remote names survive case folding.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
