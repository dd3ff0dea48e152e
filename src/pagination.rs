use std::num::IntErrorKind;

use serde::{Deserialize, Deserializer, de};

use crate::error::{AppError, AppResult};

pub const DEFAULT_PER_PAGE: u64 = 10;
pub const MAX_PER_PAGE: u64 = 20;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
pub struct PageParams {
    #[serde(default = "default_page", deserialize_with = "saturating_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    DEFAULT_PER_PAGE
}

/// A page number too large for `u64` is still a page number, just one past
/// the end; it saturates instead of failing to parse.
fn saturating_page<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim().parse::<u64>() {
        Ok(page) => Ok(page),
        Err(err) if *err.kind() == IntErrorKind::PosOverflow => Ok(u64::MAX),
        Err(err) => Err(de::Error::custom(format!("page: {err}"))),
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self { page: default_page(), per_page: default_per_page() }
    }
}

impl PageParams {
    pub fn validate(self) -> AppResult<Self> {
        if self.page < 1 {
            return Err(AppError::Validation("page must be greater than or equal to 1".into()));
        }
        if !(1..=MAX_PER_PAGE).contains(&self.per_page) {
            return Err(AppError::Validation(format!(
                "per_page must be between 1 and {MAX_PER_PAGE}"
            )));
        }
        Ok(self)
    }

    /// Rows to skip, or `None` when the offset does not fit a SQL integer.
    pub fn offset(self) -> Option<u64> {
        self.page
            .checked_sub(1)?
            .checked_mul(self.per_page)
            .filter(|offset| i64::try_from(*offset).is_ok())
    }
}

/// `ceil(total_items / per_page)`; zero for an empty table.
pub fn total_pages(total_items: u64, per_page: u64) -> u64 {
    total_items.div_ceil(per_page.max(1))
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PageLinks {
    pub prev: Option<String>,
    pub next: Option<String>,
}

impl PageLinks {
    pub fn new(base: &str, params: PageParams, total_pages: u64) -> Self {
        let link = |page: u64| format!("{base}?page={page}&per_page={}", params.per_page);
        Self {
            prev: (params.page > 1).then(|| link(params.page - 1)),
            next: (params.page < total_pages).then(|| link(params.page + 1)),
        }
    }
}
