//! Pre-filled purchase messages and the deep link that opens them in the
//! messaging app.

use anyhow::{anyhow, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::models::Product;

const MESSAGING_BASE_URL: &str = "https://wa.me/";
const NOTE_HEADER: &str = "_Pesan tambahan:_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    pub phone_number: String,
    pub default_message: String,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            phone_number: "6281234567890".into(),
            default_message: "Halo, saya tertarik dengan produk ini:".into(),
        }
    }
}

pub fn product_message(config: &MessagingConfig, product: &Product, note: Option<&str>) -> String {
    let block = [
        Some(format!("*{}*", product.product_name)),
        product.description_text().map(str::to_string),
        product.media_link().map(|link| format!("Link: {link}")),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join("\n\n");

    compose(config, &block, note)
}

pub fn cart_message(config: &MessagingConfig, products: &[Product], note: Option<&str>) -> String {
    let blocks = products
        .iter()
        .enumerate()
        .map(|(i, product)| {
            let mut block = format!("{}. *{}*", i + 1, product.product_name);
            if let Some(link) = product.media_link() {
                block.push_str("\nLink: ");
                block.push_str(link);
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    compose(config, &blocks, note)
}

fn compose(config: &MessagingConfig, body: &str, note: Option<&str>) -> String {
    let mut text = [config.default_message.trim(), body]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    if let Some(note) = note.map(str::trim).filter(|note| !note.is_empty()) {
        text.push_str("\n\n");
        text.push_str(NOTE_HEADER);
        text.push('\n');
        text.push_str(note);
    }
    text
}

/// `https://wa.me/{phone}?text=...` with the text percent-encoded.
pub fn message_url(config: &MessagingConfig, text: &str) -> Result<Url> {
    let mut url = Url::parse(MESSAGING_BASE_URL)?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("messaging base URL cannot carry a path"))?
        .clear()
        .push(config.phone_number.trim());
    url.query_pairs_mut().append_pair("text", text);

    // Form encoding writes spaces as '+'; a literal '+' is already %2B.
    let query = url.query().map(|query| query.replace('+', "%20"));
    url.set_query(query.as_deref());
    Ok(url)
}

pub fn product_link(
    config: &MessagingConfig,
    product: &Product,
    note: Option<&str>,
) -> Result<Url> {
    message_url(config, &product_message(config, product, note))
}

pub fn cart_link(config: &MessagingConfig, products: &[Product], note: Option<&str>) -> Result<Url> {
    message_url(config, &cart_message(config, products, note))
}
