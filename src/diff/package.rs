//! Package map differencing.
//!
//! Two shapes of inventory are supported: one installed instance per package
//! name, and multi-version maps where the same name can be installed at
//! several locations. Both diffs are instantiations of the same generic
//! partition walk; the multi-version case applies it a second time to the
//! per-location sub-maps.
//!
//! Both input maps are taken by value and consumed. Only the `version`
//! field decides whether a shared package counts as changed; sizes vary
//! across builds of the same version and are carried for reporting only.

use std::collections::HashMap;

use serde::Serialize;

/// Metadata for one installed package instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageInfo {
    pub version: String,
    /// Installed size in bytes; -1 when unknown.
    pub size: i64,
}

impl PackageInfo {
    pub fn new(version: impl Into<String>, size: i64) -> Self {
        Self {
            version: version.into(),
            size,
        }
    }
}

/// Inventory with at most one instance per package name.
pub type PackageMap = HashMap<String, PackageInfo>;

/// Inventory keyed by package name, then by install location.
pub type MultiVersionPackageMap = HashMap<String, HashMap<String, PackageInfo>>;

/// A package present in both images with differing versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionDiff {
    pub name: String,
    pub first: PackageInfo,
    pub second: PackageInfo,
}

/// Result of diffing two single-version package maps.
///
/// A name appears in at most one of the three partitions; packages with the
/// same version in both images appear in none of them.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct PackageDiff {
    pub only_in_first: PackageMap,
    pub only_in_second: PackageMap,
    pub changed: Vec<VersionDiff>,
}

/// The unmatched instances of one package name across both images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiVersionDiff {
    pub name: String,
    pub first: Vec<PackageInfo>,
    pub second: Vec<PackageInfo>,
}

/// Result of diffing two multi-version package maps.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct MultiVersionPackageDiff {
    pub only_in_first: MultiVersionPackageMap,
    pub only_in_second: MultiVersionPackageMap,
    pub changed: Vec<MultiVersionDiff>,
}

/// Split two maps into entries unique to each side, handing every shared
/// key to `shared` along with both values.
fn partition_maps<V>(
    first: HashMap<String, V>,
    mut second: HashMap<String, V>,
    mut shared: impl FnMut(String, V, V),
) -> (HashMap<String, V>, HashMap<String, V>) {
    let mut only_first = HashMap::new();
    for (key, value) in first {
        match second.remove(&key) {
            Some(other) => shared(key, value, other),
            None => {
                only_first.insert(key, value);
            }
        }
    }
    (only_first, second)
}

/// Diff two single-version package maps.
pub fn diff_packages(first: PackageMap, second: PackageMap) -> PackageDiff {
    let mut changed = Vec::new();
    let (only_in_first, only_in_second) = partition_maps(first, second, |name, a, b| {
        if a.version != b.version {
            changed.push(VersionDiff {
                name,
                first: a,
                second: b,
            });
        }
    });
    PackageDiff {
        only_in_first,
        only_in_second,
        changed,
    }
}

/// Diff two multi-version package maps.
///
/// For a name present in both images, the location sub-maps are partitioned
/// the same way the outer maps are: an instance at the same location with
/// the same version in both images is dropped, everything else lands in the
/// per-image instance lists. Names whose every instance matches produce no
/// `changed` entry at all.
pub fn diff_multi_packages(
    first: MultiVersionPackageMap,
    second: MultiVersionPackageMap,
) -> MultiVersionPackageDiff {
    let mut changed = Vec::new();
    let (only_in_first, only_in_second) = partition_maps(first, second, |name, a, b| {
        let mut instances_first = Vec::new();
        let mut instances_second = Vec::new();
        let (rest_first, rest_second) = partition_maps(a, b, |_location, ia, ib| {
            if ia.version != ib.version {
                instances_first.push(ia);
                instances_second.push(ib);
            }
        });
        instances_first.extend(rest_first.into_values());
        instances_second.extend(rest_second.into_values());

        if !instances_first.is_empty() || !instances_second.is_empty() {
            changed.push(MultiVersionDiff {
                name,
                first: instances_first,
                second: instances_second,
            });
        }
    });
    MultiVersionPackageDiff {
        only_in_first,
        only_in_second,
        changed,
    }
}
