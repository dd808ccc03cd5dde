//! Identifier sanitizing.

use std::collections::HashSet;

use sqlx::Row;
use tabsql_core::{Dialect, Error, Identifiers};
use tracing::debug;

use crate::engine::{fetch_one, SqliteEngine};
use crate::error::Result;

impl SqliteEngine {
    /// Quotes identifiers with the engine's own quoting function.
    ///
    /// All names go through one query. Input that is already quoted is
    /// unquoted first, so sanitizing a sanitized name returns it unchanged.
    /// Names the engine refuses (empty, too long, embedded NUL) fail the
    /// whole call with [`Error::UnsafeIdentifier`] listing each of them.
    pub async fn sanitize<S: AsRef<str>>(&mut self, identifiers: &[S]) -> Result<Vec<String>> {
        if identifiers.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<String> = identifiers
            .iter()
            .map(|identifier| {
                let identifier = identifier.as_ref();
                self.dialect
                    .unquote(identifier)
                    .unwrap_or_else(|| identifier.to_string())
            })
            .collect();

        let statement = self.dialect.sanitize(&raw);
        let row = fetch_one(&mut self.conn, &self.dialect, &statement).await?;

        let mut quoted = Vec::with_capacity(raw.len());
        let mut refused = Vec::new();
        for (index, identifier) in identifiers.iter().enumerate() {
            match row.try_get::<Option<String>, _>(index)? {
                Some(name) => quoted.push(name),
                None => refused.push(identifier.as_ref().to_string()),
            }
        }
        if !refused.is_empty() {
            return Err(Error::UnsafeIdentifier {
                identifiers: refused,
            }
            .into());
        }
        Ok(quoted)
    }

    /// Sanitizes `raw` (duplicates allowed) into a lookup map.
    pub(crate) async fn identifiers(&mut self, raw: &[String]) -> Result<Identifiers> {
        let mut seen = HashSet::new();
        let unique: Vec<String> = raw
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect();
        let quoted = self.sanitize(&unique).await?;
        debug!(count = unique.len(), "Sanitized identifiers");
        Ok(Identifiers::new(&unique, quoted))
    }
}
