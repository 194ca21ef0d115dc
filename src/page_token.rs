//! Cursor pagination for list endpoints
//!
//! A page token carries the filter, ordering and offset of the request that
//! started the listing, so follow-up requests only need to send the token.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
    policy::{FilterOptions, PolicyError},
    query::{QueryError, QuerySet},
};

pub const DEFAULT_PAGE_SIZE: u64 = 25;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PageTokenError {
    #[error("failed to decode page token, make sure it is from a previous request")]
    InvalidToken,

    #[error("failed to marshal json: {0}")]
    Encode(String),

    #[error("page size cannot be less than 1")]
    PageSizeTooSmall,

    #[error("page size cannot be greater than 100")]
    PageSizeTooLarge,

    #[error("applying order by from page token: {source} ({order_by})")]
    OrderBy {
        source: PolicyError,
        order_by: String,
    },

    #[error("applying filter from page token: {0}")]
    Filter(#[source] QueryError),
}

/// List request fields relevant to pagination.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub filter: String,
    /// Comma-separated `field [asc|desc]` list.
    #[serde(default)]
    pub order_by: String,
    /// Zero picks the default page size.
    #[serde(default)]
    pub page_size: i32,
    /// Token returned by the previous page; empty for the first page.
    #[serde(default)]
    pub page_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageToken {
    pub offset: u64,
    pub filter: String,
    pub order_by: String,
    pub page_size: u64,
}

impl PageToken {
    /// The request's token if it has one, otherwise a first-page token built
    /// from the request fields.
    pub fn from_request(request: &PageRequest) -> Result<Self, PageTokenError> {
        if !request.page_token.is_empty() {
            return Self::decode(&request.page_token);
        }
        let page_size =
            u64::try_from(request.page_size).map_err(|_| PageTokenError::PageSizeTooSmall)?;
        Ok(PageToken {
            offset: 0,
            filter: request.filter.clone(),
            order_by: request.order_by.clone(),
            page_size,
        })
    }

    /// URL-safe base64 of the token's JSON; empty when the page size is 0.
    pub fn encode(&self) -> Result<String, PageTokenError> {
        if self.page_size == 0 {
            return Ok(String::new());
        }
        let data = serde_json::to_vec(self).map_err(|e| PageTokenError::Encode(e.to_string()))?;
        Ok(URL_SAFE.encode(data))
    }

    pub fn decode(token: &str) -> Result<Self, PageTokenError> {
        let data = URL_SAFE
            .decode(token)
            .map_err(|_| PageTokenError::InvalidToken)?;
        serde_json::from_slice(&data).map_err(|_| PageTokenError::InvalidToken)
    }

    /// Apply ordering, paging and filter to `query`.
    ///
    /// A page size of 0 becomes [`DEFAULT_PAGE_SIZE`].
    pub fn apply<'m>(
        &mut self,
        query: QuerySet<'m>,
        options: &FilterOptions,
    ) -> Result<QuerySet<'m>, PageTokenError> {
        let mut query = query;
        if !self.order_by.is_empty() {
            let terms = options
                .verify_order_by(&self.order_by)
                .map_err(|source| PageTokenError::OrderBy {
                    source,
                    order_by: self.order_by.clone(),
                })?;
            query = query.order_by(terms);
        }

        if self.page_size == 0 {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        if self.page_size > MAX_PAGE_SIZE {
            return Err(PageTokenError::PageSizeTooLarge);
        }

        query = query.offset(self.offset).limit(self.page_size);
        if !self.filter.is_empty() {
            query = query
                .aip160(&self.filter, options)
                .map_err(PageTokenError::Filter)?;
        }
        Ok(query)
    }

    /// Token for the page after one that returned `fetched` rows out of
    /// `total`; `None` once the listing is exhausted.
    pub fn next(&self, fetched: u64, total: u64) -> Result<Option<String>, PageTokenError> {
        let Some(offset) = self.offset.checked_add(fetched) else {
            debug!(offset = self.offset, fetched, "offset overflow, last page");
            return Ok(None);
        };
        let next = PageToken {
            offset,
            ..self.clone()
        };
        if next.offset >= total {
            debug!(offset = next.offset, total, "last page");
            return Ok(None);
        }
        next.encode().map(Some)
    }
}

impl<'m> QuerySet<'m> {
    /// Prepare this query for one page of `request`.
    ///
    /// Returns the paged query together with the token it was built from;
    /// pass the row count and the total from
    /// [`count_query`](QuerySet::count_query) to [`PageToken::next`] to get
    /// the following page's token.
    pub fn page(
        self,
        request: &PageRequest,
        options: &FilterOptions,
    ) -> Result<(QuerySet<'m>, PageToken), PageTokenError> {
        let mut token = PageToken::from_request(request)?;
        let query = token.apply(self, options)?;
        debug!(offset = token.offset, page_size = token.page_size, "page query");
        Ok((query, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_page_size_encodes_empty() {
        assert_eq!(PageToken::default().encode().unwrap(), "");
    }

    #[test]
    fn test_decode_garbage() {
        assert_eq!(PageToken::decode("%%%"), Err(PageTokenError::InvalidToken));
        assert_eq!(
            PageToken::decode(&URL_SAFE.encode("not json")),
            Err(PageTokenError::InvalidToken)
        );
    }

    #[test]
    fn test_negative_page_size() {
        let request = PageRequest {
            page_size: -1,
            ..Default::default()
        };
        assert_eq!(
            PageToken::from_request(&request),
            Err(PageTokenError::PageSizeTooSmall)
        );
    }
}
