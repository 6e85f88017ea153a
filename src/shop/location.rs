use anyhow::{Context, Result};
use reqwest::Url;

use crate::models::Product;

pub const PRODUCT_PARAM: &str = "product";
const SHARE_DESCRIPTION_CHARS: usize = 100;

/// Address of the shop page. Opening or closing a product detail rewrites
/// only the `product` query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopLocation {
    url: Url,
}

impl ShopLocation {
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw).with_context(|| format!("invalid shop URL {raw:?}"))?;
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn product_slug(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == PRODUCT_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|slug| !slug.is_empty())
    }

    pub fn open_product(&mut self, slug: &str) {
        self.rewrite(Some(slug));
    }

    pub fn close_product(&mut self) {
        self.rewrite(None);
    }

    // Replaces the first `product` pair in place (appending when absent),
    // drops any duplicates and keeps every other pair in order.
    fn rewrite(&mut self, slug: Option<&str>) {
        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut placed = false;
        for (key, value) in self.url.query_pairs() {
            if key == PRODUCT_PARAM {
                if let (Some(slug), false) = (slug, placed) {
                    pairs.push((PRODUCT_PARAM.to_string(), slug.to_string()));
                    placed = true;
                }
                continue;
            }
            pairs.push((key.into_owned(), value.into_owned()));
        }
        if let (Some(slug), false) = (slug, placed) {
            pairs.push((PRODUCT_PARAM.to_string(), slug.to_string()));
        }

        if pairs.is_empty() {
            self.url.set_query(None);
        } else {
            self.url
                .query_pairs_mut()
                .clear()
                .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
    }
}

/// `{origin}/shop?product={slug}`
pub fn share_url(origin: &str, slug: &str) -> Result<Url> {
    let mut url = Url::parse(origin).with_context(|| format!("invalid origin {origin:?}"))?;
    url.set_path("/shop");
    url.set_fragment(None);
    url.query_pairs_mut().clear().append_pair(PRODUCT_PARAM, slug);
    Ok(url)
}

pub fn share_description(product: &Product) -> String {
    match product.description_text() {
        Some(text) => {
            let mut chars = text.chars();
            let head: String = chars.by_ref().take(SHARE_DESCRIPTION_CHARS).collect();
            if chars.next().is_some() {
                format!("{head}...")
            } else {
                head
            }
        }
        None => format!("Check out this product: {}", product.product_name),
    }
}
