//! Component (mod) records
//!
//! A component is one independently versioned unit of a pack. Components are
//! identified by name alone: two records with the same name but different
//! versions are the same component at different versions, never two entries
//! of a set.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

/// Owner name used for the single archive of a monolithic pack
pub const MONOLITHIC_OWNER: &str = "package";

/// A set of components keyed by name
pub type ComponentSet = BTreeSet<Component>;

/// Where a component's archive can be fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLocator {
    pub url: String,

    /// Checksum published by the catalog (Solder publishes MD5)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl DownloadLocator {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            checksum: None,
        }
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// Last path segment of the URL, used to name the cached archive
    pub fn file_name(&self) -> Option<&str> {
        let path = self.url.split(['?', '#']).next().unwrap_or_default();
        path.rsplit('/').next().filter(|name| !name.is_empty())
    }
}

/// One installable mod within a pack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub version: String,
    pub locator: DownloadLocator,
}

impl Component {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        locator: DownloadLocator,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            locator,
        }
    }

    /// Byte-for-byte version comparison
    pub fn same_version(&self, other: &Component) -> bool {
        self.version == other.version
    }

    /// `name@version`, for logs
    pub fn label(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Component {}

impl Hash for Component {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

/// True when both sets hold the same names at the same versions
pub fn same_components(a: &ComponentSet, b: &ComponentSet) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.name == y.name && x.same_version(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(name: &str, version: &str) -> Component {
        Component::new(
            name,
            version,
            DownloadLocator::new(format!("https://mirror.example/{}-{}.zip", name, version)),
        )
    }

    #[test]
    fn test_identity_is_name_only() {
        let mut set = ComponentSet::new();
        set.insert(component("ironchest", "1.0"));
        set.insert(component("ironchest", "2.0"));

        assert_eq!(set.len(), 1);
        assert_eq!(component("ironchest", "1.0"), component("ironchest", "2.0"));
        assert!(!component("ironchest", "1.0").same_version(&component("ironchest", "2.0")));
    }

    #[test]
    fn test_same_components_checks_versions() {
        let a: ComponentSet = [component("a", "1"), component("b", "1")].into();
        let b: ComponentSet = [component("b", "1"), component("a", "1")].into();
        let c: ComponentSet = [component("a", "1"), component("b", "2")].into();

        assert!(same_components(&a, &b));
        assert!(!same_components(&a, &c));
    }

    #[test]
    fn test_locator_file_name() {
        let locator = DownloadLocator::new("https://mirror.example/mods/jei/jei-4.16.zip?x=1");
        assert_eq!(locator.file_name(), Some("jei-4.16.zip"));

        let bare = DownloadLocator::new("https://mirror.example/");
        assert_eq!(bare.file_name(), None);
    }
}
