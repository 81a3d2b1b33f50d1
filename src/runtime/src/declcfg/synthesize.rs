//! Building declarative-config records from a bundle.

use declcfg_core::declcfg::{
    BundleRecord, Icon, PackageRecord, Property, BUNDLE_SCHEMA, PACKAGE_SCHEMA,
};
use declcfg_core::error::{CatalogError, Result};
use std::path::PathBuf;

use crate::bundle::{split_channels, BundleView};
use super::writer::is_plain_file_name;

fn require(bundle: &BundleView, value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CatalogError::missing_field(&bundle.image, field));
    }
    Ok(())
}

/// The package name becomes `<folder>/<package>.json`.
fn require_package(bundle: &BundleView) -> Result<()> {
    require(bundle, &bundle.package, "package name")?;
    if !is_plain_file_name(&bundle.package) {
        return Err(CatalogError::InvalidBundle {
            path: PathBuf::from(&bundle.image),
            message: format!("package name {:?} is not a plain file name", bundle.package),
        });
    }
    Ok(())
}

/// Build the `olm.bundle` record for `bundle`.
///
/// The bundle's own properties come first, followed by one `olm.channel`
/// property per channel, then `skips` and `skipsRange`. Every channel
/// property carries the same replaces edge: the CSV has a single `replaces`
/// and it is not tracked per channel.
pub fn new_config_bundle(bundle: &BundleView) -> Result<BundleRecord> {
    require_package(bundle)?;
    require(bundle, &bundle.version, "version")?;
    require(bundle, &bundle.csv_name, "csv name")?;

    let mut properties = bundle.properties.clone();
    properties.extend(
        bundle
            .channels
            .iter()
            .map(|channel| Property::channel(channel.as_str(), bundle.replaces.as_str())),
    );
    properties.push(Property::skips(&bundle.skips));
    properties.push(Property::skip_range(bundle.skip_range.as_str()));

    Ok(BundleRecord {
        schema: BUNDLE_SCHEMA.to_string(),
        name: bundle.csv_name.clone(),
        package: bundle.package.clone(),
        image: bundle.image.clone(),
        version: bundle.version.clone(),
        properties,
        // BTreeSet iteration is sorted
        related_images: bundle.related_images.iter().cloned().collect(),
    })
}

/// Build the `olm.package` record for the package `bundle` belongs to.
///
/// Channels come from the bundle's channels annotation through
/// [`split_channels`], which trims and de-duplicates entries. The legacy
/// tooling split on `,` only and kept blanks and repeats as they were.
pub fn new_config_package(bundle: &BundleView) -> Result<PackageRecord> {
    require_package(bundle)?;

    Ok(PackageRecord {
        schema: PACKAGE_SCHEMA.to_string(),
        name: bundle.package.clone(),
        default_channel: bundle.default_channel.clone(),
        icon: Icon::default(),
        channels: split_channels(&bundle.channels_annotation),
        description: String::new(),
    })
}

/// Build both records for `bundle`. Nothing is produced if either fails.
pub fn synthesize(bundle: &BundleView) -> Result<(PackageRecord, BundleRecord)> {
    let bundle_record = new_config_bundle(bundle)?;
    let package_record = new_config_package(bundle)?;
    Ok((package_record, bundle_record))
}
