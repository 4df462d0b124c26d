pub mod fitting;
pub mod measurement;

use serde::Deserialize;

/// Hard ceiling on page sizes requested by clients.
pub const MAX_PAGE_SIZE: i64 = 100;

/// `?skip=&limit=` pagination parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    /// Clamp to `(skip >= 0, 1 <= limit <= MAX_PAGE_SIZE)`, using
    /// `default_limit` when no limit was given.
    pub fn resolve(&self, default_limit: i64) -> (i64, i64) {
        let skip = self.skip.unwrap_or(0).max(0);
        let limit = self.limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE);
        (skip, limit)
    }
}
