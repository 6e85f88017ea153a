use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::{Client, StatusCode, Url};

use super::{FeedError, FeedProvider, PageQuery};
use crate::media;
use crate::models::{Product, ProductBySlugResponse, ProductsPageResponse};
use crate::settings::StorefrontSettings;

const PRODUCTS_PATH: [&str; 3] = ["api", "db", "products"];

/// Catalog client for the product worker API.
#[derive(Clone)]
pub struct HttpFeedProvider {
    client: Client,
    base_url: Option<Url>,
}

impl HttpFeedProvider {
    /// An absent or unparseable base URL is accepted here; every request then
    /// fails with [`FeedError::NotConfigured`].
    pub fn new(base_url: Option<&str>, timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.and_then(|raw| match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(err) => {
                warn!("Ignoring invalid catalog base URL {raw:?}: {err}");
                None
            }
        });
        Ok(Self { client, base_url })
    }

    pub fn from_settings(settings: &StorefrontSettings) -> Result<Self, FeedError> {
        Self::new(settings.api_base_url(), settings.request_timeout())
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    fn endpoint(&self, extra: &[&str]) -> Result<Url, FeedError> {
        let mut url = self.base_url.clone().ok_or(FeedError::NotConfigured)?;
        url.path_segments_mut()
            .map_err(|_| FeedError::NotConfigured)?
            .pop_if_empty()
            .extend(PRODUCTS_PATH)
            .extend(extra);
        Ok(url)
    }

    pub(crate) fn page_url(&self, query: &PageQuery) -> Result<Url, FeedError> {
        let mut url = self.endpoint(&[])?;
        url.query_pairs_mut()
            .append_pair("limit", &query.limit.to_string())
            .append_pair("page", &query.page.to_string())
            .append_pair("order_by", &query.order_by)
            .append_pair("order", &query.order);
        Ok(url)
    }

    pub(crate) fn slug_url(&self, slug: &str) -> Result<Url, FeedError> {
        self.endpoint(&["slug", slug])
    }
}

#[async_trait]
impl FeedProvider for HttpFeedProvider {
    async fn get_page(&self, query: &PageQuery) -> Result<Vec<Product>, FeedError> {
        let url = self.page_url(query)?;
        debug!("Fetching catalog page {}", url);

        let response = self.client.get(url).send().await.map_err(|err| {
            error!("Catalog page {} request failed: {err}", query.page);
            FeedError::from(err)
        })?;
        let status = response.status();
        if !status.is_success() {
            error!("Catalog page {} returned HTTP {}", query.page, status);
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let products = parse_page(&body)?;
        debug!("Catalog page {} yielded {} products", query.page, products.len());
        Ok(products)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, FeedError> {
        let url = self.slug_url(slug)?;
        debug!("Fetching product by slug {}", url);

        let response = self.client.get(url).send().await.map_err(|err| {
            error!("Lookup of product {slug:?} failed: {err}");
            FeedError::from(err)
        })?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            error!("Lookup of product {slug:?} returned HTTP {}", status);
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_lookup(&body)
    }
}

/// Decodes a listing body, keeping only displayable image products.
pub(crate) fn parse_page(body: &str) -> Result<Vec<Product>, FeedError> {
    let response: ProductsPageResponse = serde_json::from_str(body)?;
    let Some(data) = response.data else {
        return Ok(Vec::new());
    };
    let serde_json::Value::Array(entries) = data else {
        warn!("Catalog listing 'data' is not an array; treating page as empty");
        return Ok(Vec::new());
    };

    let products = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Product>(entry) {
            Ok(product) => Some(product),
            Err(err) => {
                warn!("Skipping malformed catalog entry: {err}");
                None
            }
        })
        .filter_map(listable)
        .collect();
    Ok(products)
}

pub(crate) fn parse_lookup(body: &str) -> Result<Option<Product>, FeedError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if !value.is_object() {
        return Err(FeedError::InvalidPayload(
            "expected an object with a 'data' field".into(),
        ));
    }
    let response: ProductBySlugResponse = serde_json::from_value(value)?;
    if response.error.is_some() {
        return Ok(None);
    }
    Ok(response.data.and_then(listable))
}

fn listable(mut product: Product) -> Option<Product> {
    if !product.is_image() {
        return None;
    }
    product.asset_link = product.media_link().map(media::listing_image_url);
    Some(product)
}
