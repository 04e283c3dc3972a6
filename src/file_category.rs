/// Extension-based file categories.
///
/// Files are routed into one top-level directory per category under the
/// destination root. The mapping from extension to category comes from the
/// configured allow-lists; anything not listed lands in `others`.
///
/// # Examples
///
/// ```
/// use filene::config::ExtensionLists;
/// use filene::file_category::{Category, ExtensionMapper};
///
/// let mapper = ExtensionMapper::from_lists(&ExtensionLists::default());
/// assert_eq!(mapper.categorize(Some("JPG")), Category::Images);
/// assert_eq!(mapper.categorize(Some(".mp3")), Category::Musics);
/// assert_eq!(mapper.categorize(None), Category::Others);
/// ```
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::config::ExtensionLists;

/// A top-level destination category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Documents,
    Images,
    Musics,
    Videos,
    /// Anything whose extension is in no configured list.
    Others,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Documents,
        Category::Images,
        Category::Musics,
        Category::Videos,
        Category::Others,
    ];

    /// Returns the directory name for this category.
    ///
    /// # Examples
    ///
    /// ```
    /// use filene::file_category::Category;
    ///
    /// assert_eq!(Category::Images.dir_name(), "images");
    /// assert_eq!(Category::Others.dir_name(), "others");
    /// ```
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Documents => "documents",
            Category::Images => "images",
            Category::Musics => "musics",
            Category::Videos => "videos",
            Category::Others => "others",
        }
    }
}

/// Which files a listing run picks up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetSelector {
    /// Every file, routed to its category.
    #[default]
    All,
    Documents,
    Images,
    Musics,
    Videos,
    /// Only files whose extension is in no configured list.
    Others,
}

impl TargetSelector {
    /// Whether a file of `category` is listed under this selector.
    pub fn accepts(&self, category: Category) -> bool {
        match self.category() {
            None => true,
            Some(target) => target == category,
        }
    }

    /// Category directories the listing pass should create.
    pub fn categories(&self) -> Vec<Category> {
        match self.category() {
            None => Category::ALL.to_vec(),
            Some(category) => vec![category],
        }
    }

    fn category(&self) -> Option<Category> {
        match self {
            TargetSelector::All => None,
            TargetSelector::Documents => Some(Category::Documents),
            TargetSelector::Images => Some(Category::Images),
            TargetSelector::Musics => Some(Category::Musics),
            TargetSelector::Videos => Some(Category::Videos),
            TargetSelector::Others => Some(Category::Others),
        }
    }
}

/// Maps file extensions to categories.
#[derive(Debug, Clone, Default)]
pub struct ExtensionMapper {
    extension_map: HashMap<String, Category>,
}

impl ExtensionMapper {
    /// Builds a mapper from configured allow-lists.
    ///
    /// When an extension appears in several lists the first one wins, in the
    /// order documents, images, musics, videos.
    pub fn from_lists(lists: &ExtensionLists) -> Self {
        let mut mapper = Self::default();
        let routed = [
            (&lists.documents, Category::Documents),
            (&lists.images, Category::Images),
            (&lists.musics, Category::Musics),
            (&lists.videos, Category::Videos),
        ];
        for (exts, category) in routed {
            for ext in exts {
                mapper
                    .extension_map
                    .entry(normalize_extension(ext))
                    .or_insert(category);
            }
        }
        mapper
    }

    /// Adds a file extension to category mapping, replacing any existing one.
    pub fn add_extension_mapping(&mut self, ext: &str, category: Category) {
        self.extension_map.insert(normalize_extension(ext), category);
    }

    /// Determines the category for an extension, `Others` when unknown or absent.
    pub fn categorize(&self, ext: Option<&str>) -> Category {
        ext.and_then(|e| self.extension_map.get(&normalize_extension(e)).copied())
            .unwrap_or(Category::Others)
    }
}

/// Lowercases an extension and strips a leading dot.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Returns the lowercase extension of `path`.
///
/// Files without an extension are sniffed with `infer`, so an extension-less
/// JPEG still routes to images.
pub fn detect_extension(path: &Path) -> Option<String> {
    if let Some(ext) = path.extension() {
        return Some(normalize_extension(&ext.to_string_lossy()));
    }

    match infer::get_from_path(path) {
        Ok(Some(kind)) => Some(kind.extension().to_string()),
        _ => None,
    }
}
