//! Page-number pagination for API listings.

use serde::Serialize;

use super::error::ApiError;

/// One page of a listing: `{count, next, previous, results}`.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// The page a client asked for, before the listing size is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNumber {
    Number(i64),
    Last,
}

/// A parsed `page` parameter with the configured page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedPage {
    pub number: PageNumber,
    pub size: i64,
}

impl RequestedPage {
    /// Resolve against the total count. Pages past the end are invalid,
    /// except page 1 of an empty listing.
    pub fn resolve(self, count: i64) -> Result<PageRequest, ApiError> {
        let last = ((count + self.size - 1) / self.size).max(1);
        let number = match self.number {
            PageNumber::Last => last,
            PageNumber::Number(n) if n <= last => n,
            PageNumber::Number(_) => return Err(ApiError::InvalidPage),
        };
        Ok(PageRequest {
            number,
            size: self.size,
        })
    }
}

/// A page that exists in the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: i64,
    pub size: i64,
}

impl PageRequest {
    /// Parse the `page` query value. Missing means the first page.
    pub fn parse(raw: Option<&str>, size: u32) -> Result<RequestedPage, ApiError> {
        let number = match raw.map(str::trim).filter(|v| !v.is_empty()) {
            None => PageNumber::Number(1),
            Some("last") => PageNumber::Last,
            Some(value) => value
                .parse::<i64>()
                .ok()
                .filter(|n| *n >= 1)
                .map(PageNumber::Number)
                .ok_or(ApiError::InvalidPage)?,
        };
        Ok(RequestedPage {
            number,
            size: i64::from(size.max(1)),
        })
    }

    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.number - 1) * self.size
    }

    /// Build the page body, linking neighbours through `url` (absolute, without query).
    pub fn into_page<T>(
        self,
        count: i64,
        results: Vec<T>,
        url: &str,
        raw_query: Option<&str>,
    ) -> Page<T> {
        let has_next = self.number * self.size < count;
        let next = has_next.then(|| page_link(url, raw_query, self.number + 1));
        let previous = (self.number > 1).then(|| page_link(url, raw_query, self.number - 1));
        Page {
            count,
            next,
            previous,
            results,
        }
    }
}

/// Rewrite the query string to point at `page`. The first page drops the parameter.
fn page_link(url: &str, raw_query: Option<&str>, page: i64) -> String {
    let mut pairs: Vec<String> = raw_query
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some("page"))
        .map(str::to_string)
        .collect();
    if page > 1 {
        pairs.push(format!("page={page}"));
    }
    if pairs.is_empty() {
        url.to_string()
    } else {
        format!("{url}?{}", pairs.join("&"))
    }
}
