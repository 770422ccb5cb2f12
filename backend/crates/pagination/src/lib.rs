//! Offset pagination primitives shared by list endpoints.
//!
//! [`PageRequest`] turns the raw `page` and `limit` query values into a
//! validated request with defaults applied, and [`Paginated`] is the
//! envelope returned to clients alongside the page contents.

use serde::{Deserialize, Serialize};

/// Page number used when the client omits `page`.
pub const DEFAULT_PAGE: u32 = 1;

/// Page size used when the client omits `limit`.
pub const DEFAULT_LIMIT: u32 = 10;

/// Largest offset a request may reach; SQL backends bind it as a signed
/// 64-bit integer.
pub const MAX_OFFSET: u64 = i64::MAX.unsigned_abs();

/// Errors raised while parsing page parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageRequestError {
    /// The `page` value was not a whole number.
    #[error("page must be a whole number, got {value:?}")]
    InvalidPage {
        /// Raw value supplied by the client.
        value: String,
    },
    /// The `limit` value was not a whole number.
    #[error("limit must be a whole number, got {value:?}")]
    InvalidLimit {
        /// Raw value supplied by the client.
        value: String,
    },
    /// The `page` value was below one.
    #[error("page must be at least 1")]
    PageOutOfRange,
    /// The `limit` value was below one.
    #[error("limit must be at least 1")]
    LimitOutOfRange,
    /// The page starts beyond [`MAX_OFFSET`].
    #[error("page {page} with limit {limit} starts beyond the largest supported offset")]
    OffsetOutOfRange {
        /// Requested page.
        page: u32,
        /// Requested limit.
        limit: u32,
    },
}

impl PageRequestError {
    /// Name of the query parameter that failed validation.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::InvalidPage { .. } | Self::PageOutOfRange | Self::OffsetOutOfRange { .. } => {
                "page"
            }
            Self::InvalidLimit { .. } | Self::LimitOutOfRange => "limit",
        }
    }
}

/// Validated page coordinates.
///
/// # Examples
///
/// ```
/// use pagination::PageRequest;
///
/// let request = PageRequest::parse(Some("2"), Some("5")).expect("valid page");
/// assert_eq!(request.offset(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Build a request from already-numeric values.
    ///
    /// # Errors
    ///
    /// Returns [`PageRequestError::PageOutOfRange`] or
    /// [`PageRequestError::LimitOutOfRange`] when either value is zero, and
    /// [`PageRequestError::OffsetOutOfRange`] when the page would start
    /// beyond [`MAX_OFFSET`].
    pub fn new(page: u32, limit: u32) -> Result<Self, PageRequestError> {
        if page < 1 {
            return Err(PageRequestError::PageOutOfRange);
        }
        if limit < 1 {
            return Err(PageRequestError::LimitOutOfRange);
        }
        let request = Self { page, limit };
        if request.offset() > MAX_OFFSET {
            return Err(PageRequestError::OffsetOutOfRange { page, limit });
        }
        Ok(request)
    }

    /// Parse raw query values, applying defaults for absent ones.
    ///
    /// Values are trimmed before parsing. Negative numbers are reported as
    /// out of range rather than malformed.
    ///
    /// # Errors
    ///
    /// Returns [`PageRequestError`] when a value is not a whole number, is
    /// below one, or the page starts beyond [`MAX_OFFSET`].
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Result<Self, PageRequestError> {
        let parsed_page = match page {
            Some(raw) => parse_component(raw)
                .map_err(|()| PageRequestError::InvalidPage {
                    value: raw.to_owned(),
                })?
                .ok_or(PageRequestError::PageOutOfRange)?,
            None => DEFAULT_PAGE,
        };
        let parsed_limit = match limit {
            Some(raw) => parse_component(raw)
                .map_err(|()| PageRequestError::InvalidLimit {
                    value: raw.to_owned(),
                })?
                .ok_or(PageRequestError::LimitOutOfRange)?,
            None => DEFAULT_LIMIT,
        };
        Self::new(parsed_page, parsed_limit)
    }

    /// One-based page number.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Maximum number of items on the page.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of items skipped before this page starts. Never exceeds
    /// [`MAX_OFFSET`] for a constructed request.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1).saturating_mul(self.limit as u64)
    }
}

/// Parse one component. `Ok(None)` means the value was a valid integer
/// outside the `u32` range starting at one.
fn parse_component(raw: &str) -> Result<Option<u32>, ()> {
    let value: i64 = raw.trim().parse().map_err(|_| ())?;
    if value < 1 {
        return Ok(None);
    }
    Ok(u32::try_from(value).ok())
}

/// Paginated response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Items on the current page.
    pub data: Vec<T>,
    /// One-based page number that was served.
    pub page: u32,
    /// Page size that was applied.
    pub limit: u32,
    /// Total number of items across all pages.
    pub total: u64,
}

impl<T> Paginated<T> {
    /// Wrap a page of items with the request that produced it.
    #[must_use]
    pub const fn new(data: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            data,
            page: request.page,
            limit: request.limit,
            total,
        }
    }

    /// Map every item on the page, keeping the envelope metadata.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> Paginated<U>
    where
        F: FnMut(T) -> U,
    {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total: self.total,
        }
    }
}
