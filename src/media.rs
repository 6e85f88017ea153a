//! Google Drive link rewriting for product media.
//!
//! Catalog editors paste share links; browsers and players need the direct
//! download, thumbnail or CDN forms instead. Links from any other host are
//! returned unchanged.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::AssetKind;

pub const DEFAULT_THUMBNAIL_SIZE: u32 = 800;
pub const LISTING_IMAGE_WIDTH: u32 = 1200;

// Tried in order; the first capture wins.
const DRIVE_ID_PATTERNS: [&str; 3] = [
    r"/file/d/([a-zA-Z0-9_-]+)",
    r"[?&]id=([a-zA-Z0-9_-]+)",
    r"open\?id=([a-zA-Z0-9_-]+)",
];

static DRIVE_ID_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DRIVE_ID_PATTERNS
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
});

pub fn is_drive_url(url: &str) -> bool {
    url.contains("drive.google.com") || url.contains("docs.google.com")
}

pub fn drive_file_id(url: &str) -> Option<&str> {
    if !is_drive_url(url) {
        return None;
    }
    DRIVE_ID_REGEXES.iter().find_map(|regex| {
        regex
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    })
}

pub fn download_url(url: &str) -> String {
    match drive_file_id(url) {
        Some(id) => format!("https://drive.google.com/uc?id={id}&export=download"),
        None => url.to_string(),
    }
}

pub fn thumbnail_url(url: &str, size: u32) -> String {
    match drive_file_id(url) {
        Some(id) => format!("https://lh3.googleusercontent.com/d/{id}=s{size}"),
        None => url.to_string(),
    }
}

pub fn view_url(url: &str) -> String {
    match drive_file_id(url) {
        Some(id) => format!("https://drive.google.com/uc?id={id}&export=view"),
        None => url.to_string(),
    }
}

/// Best rendering URL for an asset of the given kind.
pub fn display_url(url: &str, kind: Option<AssetKind>) -> String {
    if !is_drive_url(url) {
        return url.to_string();
    }
    match kind {
        Some(AssetKind::Image) => thumbnail_url(url, DEFAULT_THUMBNAIL_SIZE),
        Some(AssetKind::Video) | None => download_url(url),
    }
}

/// Width-bounded CDN form applied to every listing image on ingest.
pub fn listing_image_url(url: &str) -> String {
    if !url.contains("drive.google.com") {
        return url.to_string();
    }
    match drive_file_id(url) {
        Some(id) => format!("https://lh3.googleusercontent.com/d/{id}=w{LISTING_IMAGE_WIDTH}"),
        None => url.to_string(),
    }
}
