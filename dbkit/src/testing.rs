//! In-memory driver for unit tests

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::traits::{Driver, ExecuteResult, Rows};

/// Records every statement and answers queries from canned results.
///
/// A query gets the rows of the first registered needle it contains, or an
/// empty result. Statements containing a failing needle return an error.
#[derive(Default)]
pub(crate) struct MockDriver {
    answers: Vec<(String, Rows)>,
    failures: Vec<String>,
    statements: Mutex<Vec<String>>,
}

impl MockDriver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(mut self, needle: &str, rows: Rows) -> Self {
        self.answers.push((needle.to_string(), rows));
        self
    }

    pub(crate) fn failing(mut self, needle: &str) -> Self {
        self.failures.push(needle.to_string());
        self
    }

    /// Everything run so far, in order.
    pub(crate) fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The last statement run.
    pub(crate) fn last(&self) -> String {
        self.statements().pop().unwrap_or_default()
    }

    fn record(&self, sql: &str) -> Result<()> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sql.to_string());
        if self.failures.iter().any(|n| sql.contains(n.as_str())) {
            return Err(Error::Query(format!("mock failure: {sql}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn query(&self, sql: &str) -> Result<Rows> {
        self.record(sql)?;
        Ok(self
            .answers
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn exec(&self, sql: &str) -> Result<ExecuteResult> {
        self.record(sql)?;
        Ok(ExecuteResult {
            rows_affected: 1,
            last_insert_id: Some(1),
        })
    }
}
