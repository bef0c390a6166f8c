//! Cursor paging for cloud tenant list endpoints
//!
//! List endpoints answer with `{"data": [...], "links": {"next": {"href": ...}}}`;
//! the last page has no `next` link.

use senserest_domain::constants::{ITEMS_ENDPOINT, MAX_PAGE_SIZE};
use senserest_domain::{RestError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::form_urlencoded;
use url::Url;

use crate::api::RestClient;

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    links: Option<Links>,
}

#[derive(Debug, Deserialize)]
struct Links {
    #[serde(default)]
    next: Option<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

impl RestClient {
    /// Collect the `data` items of every page starting at `endpoint`
    ///
    /// # Errors
    ///
    /// The first failing page call, or a page that is not valid JSON.
    #[instrument(skip(self))]
    pub async fn fetch_all<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(endpoint.to_string());
        let mut pages = 0_usize;

        while let Some(current) = next.take() {
            let page: Page<T> = self.get_json(&current).await?;
            pages += 1;
            items.extend(page.data);

            next = page
                .links
                .and_then(|links| links.next)
                .map(|link| relative_endpoint(self.url(), &link.href))
                .filter(|href| !href.is_empty() && *href != current);
        }

        debug!(pages, items = items.len(), "Fetched all pages");
        Ok(items)
    }

    /// Every item of the tenant, optionally limited to one resource type
    ///
    /// # Errors
    ///
    /// [`RestError::InvalidArgument`] unless `page_size` is within
    /// `1..=100`; otherwise as [`RestClient::fetch_all`].
    pub async fn fetch_all_items(
        &self,
        resource_type: Option<&str>,
        page_size: u32,
    ) -> Result<Vec<serde_json::Value>> {
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(RestError::InvalidArgument(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
            )));
        }

        let mut endpoint = format!("{ITEMS_ENDPOINT}?limit={page_size}");
        if let Some(resource_type) = resource_type {
            endpoint.push_str("&resourceType=");
            endpoint.extend(form_urlencoded::byte_serialize(resource_type.as_bytes()));
        }
        self.fetch_all(&endpoint).await
    }
}

/// Turn a `next` link into an endpoint relative to `base`
fn relative_endpoint(base: &Url, href: &str) -> String {
    let prefix = base.as_str().trim_end_matches('/');
    if let Some(rest) = href.strip_prefix(prefix) {
        return rest.to_string();
    }

    match Url::parse(href) {
        Ok(url) => match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        },
        Err(_) => href.to_string(),
    }
}
