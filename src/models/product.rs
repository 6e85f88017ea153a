//! Product records as delivered by the upstream catalog API.
//!
//! Field names follow the wire format so payloads round-trip unchanged into
//! the cart snapshot and the messaging text.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Video,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Video => "video",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: i64,
    #[serde(default)]
    pub datetime: String,
    pub product_name: String,
    pub product_slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_link: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_asset_kind",
        skip_serializing_if = "Option::is_none"
    )]
    pub asset_type: Option<AssetKind>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Product {
    /// Trimmed description, `None` when absent or blank.
    pub fn description_text(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Non-empty media link.
    pub fn media_link(&self) -> Option<&str> {
        self.asset_link
            .as_deref()
            .map(str::trim)
            .filter(|link| !link.is_empty())
    }

    pub fn is_image(&self) -> bool {
        self.asset_type == Some(AssetKind::Image) && self.media_link().is_some()
    }

    /// Listing timestamp; the upstream sends either RFC 3339 or SQLite-style
    /// `YYYY-MM-DD HH:MM:SS` values.
    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.datetime).or_else(|| parse_timestamp(&self.created_at))
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

// Unknown asset kinds are dropped rather than failing the whole page.
fn lenient_asset_kind<'de, D>(deserializer: D) -> Result<Option<AssetKind>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("image") => Some(AssetKind::Image),
        Some("video") => Some(AssetKind::Video),
        _ => None,
    })
}

/// Body of the paginated listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductsPageResponse {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub active_table: Option<String>,
}

/// Body of the lookup-by-slug endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductBySlugResponse {
    #[serde(default)]
    pub data: Option<Product>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub active_table: Option<String>,
}

#[cfg(test)]
pub(crate) fn sample_product(id: i64) -> Product {
    Product {
        id,
        datetime: "2025-01-02 10:00:00".into(),
        product_name: format!("Product {id}"),
        product_slug: format!("product-{id}"),
        description: Some(format!("Description {id}")),
        asset_link: Some(format!("https://cdn.example.com/{id}.jpg")),
        asset_type: Some(AssetKind::Image),
        created_at: "2025-01-02T10:00:00Z".into(),
        updated_at: "2025-01-02T10:00:00Z".into(),
    }
}

#[cfg(test)]
pub(crate) fn sample_products(count: usize) -> Vec<Product> {
    (1..=count as i64).map(sample_product).collect()
}
