//! PWA manifest served at a fixed path.

use serde::{Deserialize, Serialize};

use super::cache::AssetResponse;

pub const MANIFEST_PATH: &str = "/manifest.webmanifest";
pub const MANIFEST_CONTENT_TYPE: &str = "application/manifest+json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    Fullscreen,
    Standalone,
    MinimalUi,
    Browser,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestIcon {
    pub src: String,
    pub sizes: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

impl ManifestIcon {
    pub fn png(src: impl Into<String>, size: u32) -> Self {
        Self {
            src: src.into(),
            sizes: format!("{size}x{size}"),
            mime_type: "image/png".to_string(),
            purpose: None,
        }
    }
}

/// Web app manifest; keys follow the W3C member names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebManifest {
    pub name: String,
    pub short_name: String,
    pub start_url: String,
    pub scope: String,
    pub display: DisplayMode,
    pub background_color: String,
    pub theme_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default)]
    pub icons: Vec<ManifestIcon>,
}

impl Default for WebManifest {
    fn default() -> Self {
        Self {
            name: "SmartCow".to_string(),
            short_name: "SmartCow".to_string(),
            start_url: "/".to_string(),
            scope: "/".to_string(),
            display: DisplayMode::Standalone,
            background_color: "#ffffff".to_string(),
            theme_color: "#166534".to_string(),
            lang: Some("pt-BR".to_string()),
            icons: vec![
                ManifestIcon::png("/icons/icon-192.png", 192),
                ManifestIcon {
                    purpose: Some("any maskable".to_string()),
                    ..ManifestIcon::png("/icons/icon-512.png", 512)
                },
            ],
        }
    }
}

impl WebManifest {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_response(&self) -> serde_json::Result<AssetResponse> {
        Ok(AssetResponse::ok(MANIFEST_CONTENT_TYPE, self.to_json()?))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    #[test]
    fn serializes_w3c_member_names() {
        let json: Value = serde_json::from_str(&WebManifest::default().to_json().unwrap()).unwrap();
        assert_eq!(json["short_name"], "SmartCow");
        assert_eq!(json["start_url"], "/");
        assert_eq!(json["display"], "standalone");
        assert_eq!(json["icons"][0]["type"], "image/png");
        assert_eq!(json["icons"][1]["sizes"], "512x512");
        assert!(json["icons"][0].get("purpose").is_none());
    }
}
