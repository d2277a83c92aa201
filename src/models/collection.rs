use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One of the three logical document sets mirrored from upstream
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Collection {
    GalaxyClusters,
    Objects,
    Taxonomies,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::GalaxyClusters,
        Collection::Objects,
        Collection::Taxonomies,
    ];

    /// Attributes declared filterable on this collection's index
    pub fn filterable_attributes(&self) -> &'static [&'static str] {
        match self {
            Collection::GalaxyClusters => &["galaxy"],
            Collection::Objects => &[],
            Collection::Taxonomies => &["version", "namespace", "predicate"],
        }
    }

    /// Directories, relative to the repository root, holding this collection's files.
    /// An empty string is the repository root itself.
    pub fn source_roots(&self) -> &'static [&'static str] {
        match self {
            Collection::GalaxyClusters => &[GALAXIES_DIR, CLUSTERS_DIR],
            Collection::Objects => &["objects"],
            Collection::Taxonomies => &[""],
        }
    }

    /// Whether files below the source roots are collected recursively
    pub fn recursive(&self) -> bool {
        !matches!(self, Collection::GalaxyClusters)
    }

    /// Whether a file (by name) belongs to this collection
    pub fn accepts(&self, file_name: &str) -> bool {
        match self {
            Collection::GalaxyClusters | Collection::Objects => file_name.ends_with(".json"),
            Collection::Taxonomies => file_name == MACHINETAG_FILE,
        }
    }
}

pub const GALAXIES_DIR: &str = "galaxies";
pub const CLUSTERS_DIR: &str = "clusters";
pub const MACHINETAG_FILE: &str = "machinetag.json";
