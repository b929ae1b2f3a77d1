use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use super::client::{Page, WootricClient, WootricClientError};
use super::entity::Entity;
use super::transform::{self, TransformError};

pub const PER_PAGE: usize = 50;

/// Undocumented ceiling: the API errors or degrades past 30 pages within a
/// single filter window.
pub const MAX_PAGES: u32 = 30;

#[derive(Debug, Error)]
pub enum PaginateError {
    #[error(transparent)]
    Client(#[from] WootricClientError),

    #[error(transparent)]
    Timestamp(#[from] TransformError),
}

/// Pull-based stream of raw entity rows in ascending sort order.
///
/// Internally slides a `[gt, lt)` time window over the entity's history,
/// requesting sequential pages within each window and never more than
/// `MAX_PAGES` per window. Rows whose `updated_at` does not exceed the
/// resume bookmark are dropped, which deduplicates rows re-fetched by
/// overlapping windows. The window itself is never persisted; only the
/// bookmark survives a run.
pub struct WindowPaginator<'a> {
    client: &'a WootricClient,
    entity: Entity,
    window: i64,
    /// Lower/upper window bounds in epoch seconds; the API applies both as
    /// strict inequalities.
    gt: i64,
    lt: i64,
    page: u32,
    /// Sort-key timestamp of the last row seen, used to re-anchor the window
    /// when a full page lands on the page ceiling.
    last_date: i64,
    /// Dedup threshold: rows must have `updated_at` beyond this to be
    /// yielded.
    bookmark: i64,
    /// Wall-clock capture at sync start; the window advances until its upper
    /// bound passes this, then one catch-up pass runs.
    sync_start: i64,
    last_round: bool,
    done: bool,
    filtered: usize,
    buffer: VecDeque<Value>,
}

impl<'a> WindowPaginator<'a> {
    pub fn new(
        client: &'a WootricClient,
        entity: Entity,
        resume: DateTime<Utc>,
        sync_start: DateTime<Utc>,
    ) -> Self {
        let gt = resume.timestamp();
        let window = entity.window_secs();
        Self {
            client,
            entity,
            window,
            gt,
            lt: gt + window,
            page: 1,
            last_date: gt,
            bookmark: resume.timestamp(),
            sync_start: sync_start.timestamp(),
            last_round: false,
            done: false,
            filtered: 0,
            buffer: VecDeque::new(),
        }
    }

    /// Rows dropped by the bookmark dedup filter so far.
    pub fn filtered(&self) -> usize {
        self.filtered
    }

    /// Next row, or `None` once the stream has caught up to the sync start.
    /// Any executor failure aborts the stream.
    pub async fn next_row(&mut self) -> Result<Option<Value>, PaginateError> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                return Ok(Some(row));
            }
            if self.done {
                return Ok(None);
            }
            self.fetch_next_page().await?;
        }
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let (gt_key, lt_key) = self.entity.filter_keys();
        vec![
            ("per_page", PER_PAGE.to_string()),
            ("sort_order", "asc".to_string()),
            (gt_key, self.gt.to_string()),
            (lt_key, self.lt.to_string()),
            ("page", self.page.to_string()),
            ("sort_key", self.entity.sort_key().to_string()),
        ]
    }

    async fn fetch_next_page(&mut self) -> Result<(), PaginateError> {
        let query = self.query();
        let page = self
            .client
            .fetch_page(&self.entity.path(), &query)
            .await?;

        let rows = match page {
            Page::Rows(rows) => rows,
            Page::Exhausted => Vec::new(),
        };
        let count = rows.len();

        for row in rows {
            self.last_date = row_timestamp(&row, self.entity.sort_key())?;
            let updated = row_timestamp(&row, "updated_at")?;
            if updated > self.bookmark {
                self.buffer.push_back(row);
            } else {
                self.filtered += 1;
            }
        }

        if count == PER_PAGE {
            // Full page: advance the page, or re-anchor the window past the
            // last consumed row once the ceiling is reached.
            if self.page >= MAX_PAGES {
                self.page = 1;
                self.gt = self.last_date;
            } else {
                self.page += 1;
            }
        } else {
            // Short page: this window is exhausted.
            if self.last_round && count == 0 {
                self.done = true;
            }
            self.page = 1;
            // [gt] and [lt] are both exclusive, so step back one second to
            // keep boundary rows inside the next window.
            self.gt = self.lt - 1;
            self.lt = self.gt + self.window;
        }

        if self.lt > self.sync_start {
            self.last_round = true;
        }

        Ok(())
    }
}

fn row_timestamp(row: &Value, key: &str) -> Result<i64, TransformError> {
    let raw = row.get(key).and_then(Value::as_str).unwrap_or_default();
    transform::parse_datetime(key, raw).map(|dt| dt.timestamp())
}
