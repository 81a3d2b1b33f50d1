//! Declarative-config records.
//!
//! A package config file holds one `olm.package` record followed by one
//! `olm.bundle` record per bundle added to the package. Field order of the
//! serialized records is part of the file format.

use serde::{Deserialize, Serialize};

/// Schema tag of bundle records.
pub const BUNDLE_SCHEMA: &str = "olm.bundle";

/// Schema tag of package records.
pub const PACKAGE_SCHEMA: &str = "olm.package";

/// Property type recording channel membership and the replaces edge.
pub const PROPERTY_CHANNEL: &str = "olm.channel";

/// Property type recording the skip list.
pub const PROPERTY_SKIPS: &str = "skips";

/// Property type recording the skip range.
pub const PROPERTY_SKIP_RANGE: &str = "skipsRange";

/// A typed fact attached to a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "type")]
    pub property_type: String,

    /// Opaque value, interpreted according to `property_type`
    pub value: serde_json::Value,
}

/// Value of an `olm.channel` property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPropertyValue {
    pub name: String,
    pub replaces: String,
}

impl Property {
    pub fn new(property_type: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            property_type: property_type.into(),
            value,
        }
    }

    /// `olm.channel` property for membership in `channel`.
    pub fn channel(channel: impl Into<String>, replaces: impl Into<String>) -> Self {
        let name: String = channel.into();
        let replaces: String = replaces.into();
        Self::new(
            PROPERTY_CHANNEL,
            serde_json::json!({ "name": name, "replaces": replaces }),
        )
    }

    /// `skips` property. The value is the comma-joined list as a single JSON
    /// string, not an array; existing catalog readers depend on this.
    pub fn skips<S: AsRef<str>>(skips: &[S]) -> Self {
        let joined = skips
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join(",");
        Self::new(PROPERTY_SKIPS, serde_json::Value::String(joined))
    }

    /// `skipsRange` property holding the raw range expression.
    pub fn skip_range(range: impl Into<String>) -> Self {
        Self::new(PROPERTY_SKIP_RANGE, serde_json::Value::String(range.into()))
    }
}

/// Package icon. Empty until upstream metadata carries one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icon {
    pub base64data: String,
    pub mediatype: String,
}

/// Package-level record, written once per package file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    pub schema: String,
    pub name: String,
    pub default_channel: String,
    pub icon: Icon,
    pub channels: Vec<String>,
    pub description: String,
}

/// Bundle-level record, one per processed bundle image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleRecord {
    pub schema: String,
    pub name: String,
    pub package: String,
    pub image: String,
    pub version: String,
    pub properties: Vec<Property>,
    pub related_images: Vec<String>,
}
