//! Catalog of items to acquire
//!
//! A catalog maps each [`Category`] to an ordered list of [`CatalogItem`]s and
//! is loaded from a TOML or JSON file:
//!
//! ```toml
//! [[display]]
//! path = "Nvidia"
//! url = { strategy = "page-link", page = "https://example.com/nvidia", pattern = "\\.exe$" }
//! file_type = "zip"
//!
//! [[tool]]
//! path = "CrystalDiskInfo"
//! url = "https://example.com/CrystalDiskInfo.zip"
//! file_type = "zip/exe"
//! rename_as = "CrystalDiskInfo"
//! ```
//!
//! The retry ledger stores failed items in the same shape, so a retried item is
//! the exact unit of work that failed.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Component, Path};

/// Top-level grouping of the destination tree. Processing follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Display,
    Network,
    Miscellaneous,
    Tool,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Display,
        Category::Network,
        Category::Miscellaneous,
        Category::Tool,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Display => "display",
            Self::Network => "network",
            Self::Miscellaneous => "miscellaneous",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a downloaded payload is laid out in its destination directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    /// Single installer, moved as-is.
    #[serde(rename = "exe")]
    Exe,
    /// Flat zip, extracted in place.
    #[serde(rename = "zip")]
    Zip,
    /// Zip wrapping everything in one top-level folder, flattened on extraction.
    #[serde(rename = "zip/folder")]
    ZipFolder,
    /// Zip whose deliverable is exactly one executable.
    #[serde(rename = "zip/exe")]
    ZipExe,
}

impl FileKind {
    pub fn is_archive(&self) -> bool {
        !matches!(self, Self::Exe)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exe => "exe",
            Self::Zip => "zip",
            Self::ZipFolder => "zip/folder",
            Self::ZipExe => "zip/exe",
        })
    }
}

/// Where the download URL comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UrlSource {
    /// A literal download URL.
    Direct(String),
    /// A named resolution strategy plus its parameters, run against the
    /// browser session.
    Lookup(Lookup),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookup {
    pub strategy: String,
    #[serde(flatten)]
    pub params: BTreeMap<String, String>,
}

impl Lookup {
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// One unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Destination subpath below the category directory. May be nested.
    #[serde(rename = "path")]
    pub relative_path: String,
    #[serde(rename = "url")]
    pub url_source: UrlSource,
    #[serde(rename = "file_type")]
    pub file_kind: FileKind,
    /// New base filename for the delivered executable; the extension is kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename_as: Option<String>,
}

impl CatalogItem {
    pub fn new(relative_path: impl Into<String>, url_source: UrlSource, file_kind: FileKind) -> Self {
        Self {
            relative_path: relative_path.into(),
            url_source,
            file_kind,
            rename_as: None,
        }
    }

    pub fn renamed(mut self, rename_as: impl Into<String>) -> Self {
        self.rename_as = Some(rename_as.into());
        self
    }
}

/// Items grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    groups: BTreeMap<Category, Vec<CatalogItem>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, category: Category, item: CatalogItem) {
        self.groups.entry(category).or_default().push(item);
    }

    /// Number of items across all categories.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, category: Category) -> Option<&[CatalogItem]> {
        self.groups.get(&category).map(Vec::as_slice)
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.groups.keys().copied()
    }

    /// Every item in processing order.
    pub fn entries(&self) -> impl Iterator<Item = (Category, &CatalogItem)> {
        self.groups
            .iter()
            .flat_map(|(category, items)| items.iter().map(move |item| (*category, item)))
    }

    /// Load a catalog file. The format follows the extension: `.json` is JSON,
    /// anything else is TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let catalog = if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
        .with_context(|| format!("Failed to parse catalog: {}", path.display()))?;
        Ok(catalog)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let catalog: Catalog = toml::from_str(content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let catalog: Catalog = serde_json::from_str(content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Reject items that could escape the destination tree and return warnings
    /// for duplicate paths (the later item overwrites the earlier one).
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut warnings = Vec::new();
        for (category, items) in &self.groups {
            let mut seen = HashSet::new();
            for item in items {
                if !is_safe_relative_path(&item.relative_path) {
                    anyhow::bail!(
                        "[{}] unsafe path (empty, absolute or contains ..): {}",
                        category,
                        item.relative_path
                    );
                }
                if let Some(name) = &item.rename_as
                    && !is_plain_stem(name)
                {
                    anyhow::bail!(
                        "[{}] {}: rename_as must be a plain file name, got '{}'",
                        category,
                        item.relative_path,
                        name
                    );
                }
                if !seen.insert(item.relative_path.as_str()) {
                    warnings.push(format!(
                        "[{}] duplicate path '{}', later entry overwrites earlier one",
                        category, item.relative_path
                    ));
                }
            }
        }
        Ok(warnings)
    }
}

fn is_safe_relative_path(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn is_plain_stem(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[tool]]
path = "CrystalDiskInfo"
url = "https://example.com/cdi.zip"
file_type = "zip/exe"
rename_as = "CrystalDiskInfo"

[[display]]
path = "Nvidia"
url = { strategy = "page-link", page = "https://example.com/nv", pattern = "\\.exe$" }
file_type = "zip"

[[display]]
path = "Intel/Arc"
url = "https://example.com/arc.zip"
file_type = "zip/folder"
"#;

    #[test]
    fn test_parse_toml_catalog() {
        let catalog = Catalog::from_toml_str(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 3);

        let display = catalog.get(Category::Display).unwrap();
        assert_eq!(display[0].relative_path, "Nvidia");
        assert_eq!(
            display[0].url_source,
            UrlSource::Lookup(
                Lookup::new("page-link")
                    .param("page", "https://example.com/nv")
                    .param("pattern", "\\.exe$")
            )
        );
        assert_eq!(display[1].file_kind, FileKind::ZipFolder);

        let tool = catalog.get(Category::Tool).unwrap();
        assert_eq!(tool[0].rename_as.as_deref(), Some("CrystalDiskInfo"));
    }

    #[test]
    fn test_entries_follow_category_order() {
        let catalog = Catalog::from_toml_str(SAMPLE).unwrap();
        let order: Vec<_> = catalog
            .entries()
            .map(|(c, i)| (c, i.relative_path.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (Category::Display, "Nvidia"),
                (Category::Display, "Intel/Arc"),
                (Category::Tool, "CrystalDiskInfo"),
            ]
        );
    }

    #[test]
    fn test_json_round_trip_keeps_lookup() {
        let catalog = Catalog::from_toml_str(SAMPLE).unwrap();
        let json = serde_json::to_string(&catalog).unwrap();
        assert!(json.contains("\"zip/folder\""));
        assert_eq!(Catalog::from_json_str(&json).unwrap(), catalog);
    }

    #[test]
    fn test_rejects_escaping_path() {
        let err = Catalog::from_toml_str(
            r#"
[[tool]]
path = "../outside"
url = "https://example.com/a.exe"
file_type = "exe"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unsafe path"));
    }

    #[test]
    fn test_rejects_rename_with_separator() {
        let mut catalog = Catalog::new();
        catalog.push(
            Category::Tool,
            CatalogItem::new(
                "X",
                UrlSource::Direct("https://example.com/x.exe".into()),
                FileKind::Exe,
            )
            .renamed("a/b"),
        );
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_duplicate_path_warns() {
        let mut catalog = Catalog::new();
        let item = CatalogItem::new(
            "Same",
            UrlSource::Direct("https://example.com/x.exe".into()),
            FileKind::Exe,
        );
        catalog.push(Category::Network, item.clone());
        catalog.push(Category::Network, item.clone());
        catalog.push(Category::Tool, item);

        let warnings = catalog.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("[network]"));
    }

    #[test]
    fn test_unknown_file_type_rejected() {
        let result = Catalog::from_toml_str(
            r#"
[[tool]]
path = "X"
url = "https://example.com/x.rar"
file_type = "rar"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_example_catalog_parses() {
        let catalog = Catalog::from_toml_str(include_str!("../catalog.example.toml")).unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(
            catalog.categories().collect::<Vec<_>>(),
            Category::ALL.to_vec()
        );
        let tool = &catalog.get(Category::Tool).unwrap()[0];
        assert_eq!(tool.file_kind, FileKind::ZipExe);
        assert_eq!(tool.rename_as.as_deref(), Some("CrystalDiskInfo"));
    }
}
