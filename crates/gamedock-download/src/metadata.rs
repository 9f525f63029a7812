//! Store app-details metadata lookup.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use gamedock_core::{MetadataError, MetadataResolver, ResourceMetadata};
use regex::Regex;
use serde::Deserialize;

/// Public app-details endpoint.
pub const STORE_APP_DETAILS_URL: &str = "https://store.steampowered.com/api/appdetails";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// `<strong>Storage:</strong> 15 GB available space`
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(GB|MB)\s+available space").expect("valid regex")
});

#[derive(Debug, Deserialize)]
struct AppDetailsEnvelope {
    success: bool,
    data: Option<AppDetails>,
}

#[derive(Debug, Deserialize)]
struct AppDetails {
    name: String,
    #[serde(default)]
    header_image: Option<String>,
    #[serde(default)]
    screenshots: Vec<Screenshot>,
    /// An object with `minimum`/`recommended` HTML, or `[]` when absent.
    #[serde(default)]
    pc_requirements: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Screenshot {
    path_full: String,
}

/// Resolves titles and art from the store API.
#[derive(Debug, Clone)]
pub struct StoreMetadataResolver {
    client: reqwest::Client,
    base_url: String,
}

impl StoreMetadataResolver {
    pub fn new() -> Self {
        Self::with_base_url(STORE_APP_DETAILS_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl Default for StoreMetadataResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataResolver for StoreMetadataResolver {
    async fn resolve(&self, resource_id: &str) -> Result<ResourceMetadata, MetadataError> {
        let unavailable = |e: reqwest::Error| MetadataError::Unavailable {
            message: e.to_string(),
        };
        let body = self
            .client
            .get(&self.base_url)
            .query(&[("appids", resource_id)])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(unavailable)?
            .text()
            .await
            .map_err(unavailable)?;

        tracing::debug!(resource_id, bytes = body.len(), "Fetched app details");
        parse_app_details(resource_id, &body)
    }
}

/// Extract metadata from an app-details response body.
pub fn parse_app_details(resource_id: &str, body: &str) -> Result<ResourceMetadata, MetadataError> {
    let mut envelopes: HashMap<String, AppDetailsEnvelope> =
        serde_json::from_str(body).map_err(|e| MetadataError::Unavailable {
            message: format!("unexpected response: {e}"),
        })?;

    let not_found = || MetadataError::NotFound {
        resource_id: resource_id.to_string(),
    };
    let envelope = envelopes.remove(resource_id).ok_or_else(not_found)?;
    let details = envelope
        .data
        .filter(|_| envelope.success)
        .ok_or_else(not_found)?;

    let size_hint = details
        .pc_requirements
        .get("minimum")
        .and_then(serde_json::Value::as_str)
        .and_then(parse_space_requirement);

    let mut image_refs: Vec<String> = details.header_image.into_iter().collect();
    image_refs.extend(details.screenshots.into_iter().map(|s| s.path_full));

    Ok(ResourceMetadata {
        title: details.name,
        size_hint,
        image_refs,
    })
}

/// Parse "15 GB available space" into bytes.
fn parse_space_requirement(html: &str) -> Option<u64> {
    let caps = SPACE_RE.captures(html)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit: f64 = match caps.get(2)?.as_str().to_ascii_uppercase().as_str() {
        "GB" => 1024.0 * 1024.0 * 1024.0,
        _ => 1024.0 * 1024.0,
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some((amount * unit) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TF2: &str = r#"{
        "440": {
            "success": true,
            "data": {
                "name": "Team Fortress 2",
                "header_image": "https://cdn.example/440/header.jpg",
                "screenshots": [
                    {"id": 0, "path_full": "https://cdn.example/440/ss0.jpg"},
                    {"id": 1, "path_full": "https://cdn.example/440/ss1.jpg"}
                ],
                "pc_requirements": {
                    "minimum": "<strong>Minimum:</strong><br><ul><li><strong>Storage:</strong> 15 GB available space</li></ul>"
                }
            }
        }
    }"#;

    #[test]
    fn parses_title_images_and_size() {
        let meta = parse_app_details("440", TF2).unwrap();
        assert_eq!(meta.title, "Team Fortress 2");
        assert_eq!(meta.image_refs.len(), 3);
        assert_eq!(meta.image_refs[0], "https://cdn.example/440/header.jpg");
        assert_eq!(meta.size_hint, Some(15 * 1024 * 1024 * 1024));
    }

    #[test]
    fn empty_requirements_array_has_no_size() {
        let body = r#"{"10": {"success": true, "data": {"name": "Counter-Strike", "pc_requirements": []}}}"#;
        let meta = parse_app_details("10", body).unwrap();
        assert_eq!(meta.size_hint, None);
        assert!(meta.image_refs.is_empty());
    }

    #[test]
    fn unsuccessful_lookup_is_not_found() {
        let body = r#"{"999999": {"success": false}}"#;
        assert_eq!(
            parse_app_details("999999", body),
            Err(MetadataError::NotFound {
                resource_id: "999999".into()
            })
        );
    }

    #[test]
    fn garbage_is_unavailable() {
        assert!(matches!(
            parse_app_details("1", "<html>"),
            Err(MetadataError::Unavailable { .. })
        ));
    }

    #[test]
    fn megabyte_requirements() {
        assert_eq!(
            parse_space_requirement("500 MB available space"),
            Some(500 * 1024 * 1024)
        );
    }
}
