//! Site banners (ad and announcement strips).

use serde::{Deserialize, Serialize};

use super::id::BannerId;

/// The two banner slots rendered by the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerKind {
    Ad,
    Announcement,
}

impl BannerKind {
    /// Both banner kinds.
    pub const ALL: [Self; 2] = [Self::Ad, Self::Announcement];

    /// Path segment used by the banner endpoints.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Ad => "ad",
            Self::Announcement => "announcement",
        }
    }
}

impl std::fmt::Display for BannerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// Server representation of a banner.
///
/// Fields the state layer does not interpret are kept in `extra` so they
/// survive a round trip through an optimistic edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<BannerId>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Banner {
    /// The banner's content: text for announcements, image for ads.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.text.as_deref().or(self.image.as_deref())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_keeps_unknown_fields() {
        let json = r##"{"_id": "b1", "isActive": true, "text": "Free returns", "linkUrl": "/returns"}"##;
        let banner: Banner = serde_json::from_str(json).unwrap();
        assert!(banner.is_active);
        assert_eq!(banner.content(), Some("Free returns"));
        assert_eq!(banner.extra["linkUrl"], "/returns");

        let back = serde_json::to_value(&banner).unwrap();
        assert_eq!(back["linkUrl"], "/returns");
        assert_eq!(back["isActive"], true);
    }

    #[test]
    fn test_kind_slug() {
        assert_eq!(BannerKind::Ad.slug(), "ad");
        assert_eq!(BannerKind::Announcement.to_string(), "announcement");
    }
}
