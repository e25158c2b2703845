//! Enumeration of paginated list endpoints.

use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::pin::Pin;
use tracing::{debug, warn};
use url::Url;

use crate::client::ManagementClient;
use crate::error::{Error, Result};

/// One page of a list response. Most endpoints use `value`, a few use `items`.
#[derive(Debug, Deserialize)]
struct CollectionPage {
    #[serde(default)]
    value: Option<Vec<Value>>,
    #[serde(default)]
    items: Option<Vec<Value>>,
    #[serde(default, rename = "nextLink")]
    next_link: Option<String>,
}

impl CollectionPage {
    fn into_parts(self) -> (Vec<Value>, Option<String>) {
        let items = self.value.or(self.items).unwrap_or_default();
        let next = self.next_link.filter(|link| !link.trim().is_empty());
        (items, next)
    }
}

pub type ItemStream<'a> = Pin<Box<dyn Stream<Item = Result<Value>> + Send + 'a>>;

/// Reads a collection page by page, following `nextLink` until it runs out.
pub struct PagedCollectionReader<'a> {
    client: &'a ManagementClient,
    max_pages: usize,
}

impl<'a> PagedCollectionReader<'a> {
    pub fn new(client: &'a ManagementClient, max_pages: usize) -> Self {
        Self { client, max_pages }
    }

    /// Lazily yield every item of the collection at `url`.
    ///
    /// An absent or unparsable first page is an empty collection. A failure
    /// later on is yielded once as `Error::PartialCollection` and ends the
    /// stream; items yielded before it stay valid.
    pub fn items(&self, url: Url) -> ItemStream<'a> {
        let client = self.client;
        let max_pages = self.max_pages;

        Box::pin(async_stream::stream! {
            let mut next = Some(url);
            let mut seen: HashSet<String> = HashSet::new();
            let mut pages = 0usize;

            while let Some(url) = next.take() {
                if pages >= max_pages {
                    warn!(pages, "Page limit reached, stopping collection read");
                    break;
                }
                if !seen.insert(url.to_string()) {
                    warn!(%url, "Continuation link repeats an earlier page, stopping");
                    break;
                }

                let body = match client.get_bytes(url).await {
                    Ok(Some(body)) => body,
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(Error::PartialCollection { pages, reason: e.to_string() });
                        break;
                    }
                };

                let page: CollectionPage = match serde_json::from_slice(&body) {
                    Ok(page) => page,
                    Err(e) if pages == 0 => {
                        warn!(error = %e, "Collection response is not a list, treating as empty");
                        break;
                    }
                    Err(e) => {
                        yield Err(Error::PartialCollection { pages, reason: e.to_string() });
                        break;
                    }
                };
                pages += 1;

                let (items, next_link) = page.into_parts();
                debug!(page = pages, items = items.len(), "Read collection page");
                for item in items {
                    yield Ok(item);
                }

                if let Some(link) = next_link {
                    match Url::parse(&link) {
                        Ok(url) => next = Some(url),
                        Err(e) => {
                            yield Err(Error::PartialCollection {
                                pages,
                                reason: format!("invalid nextLink '{}': {}", link, e),
                            });
                        }
                    }
                }
            }
        })
    }

    /// Drain the whole collection. Items read before a failure are kept and the
    /// failure is returned alongside them.
    pub async fn collect(&self, url: Url) -> (Vec<Value>, Option<Error>) {
        let mut stream = self.items(url);
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(value) => items.push(value),
                Err(e) => return (items, Some(e)),
            }
        }
        (items, None)
    }
}
