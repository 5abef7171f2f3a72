//! File classification: mapping an extension (and optionally a sniffed MIME
//! type) to a category and subcategory.
//!
//! The category table is loaded once per pass and is immutable while the pass
//! runs. Classification itself is a pure lookup with no filesystem access,
//! and it is total: every input maps to a defined category, falling back to
//! `Others` for anything unrecognized.
//!
//! # Examples
//!
//! ```
//! use desktidy::classifier::CategoryTable;
//!
//! let table = CategoryTable::default();
//! let c = table.classify(Some("pdf"), None);
//! assert_eq!(c.category, "Documents");
//! assert_eq!(c.subcategory, "PDF");
//!
//! let c = table.classify(Some("xyz"), None);
//! assert_eq!(c.category, "Others");
//! assert_eq!(c.subcategory, "XYZ");
//! ```

use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::config::ConfigError;

/// Name of the fallback category for unrecognized files.
pub const FALLBACK_CATEGORY: &str = "Others";

/// Category loose top-level directories are routed to.
pub const FOLDERS_CATEGORY: &str = "Folders";

/// Subcategory assigned to files without an extension.
pub const UNKNOWN_SUBCATEGORY: &str = "Unknown";

/// A named category and the extensions it owns.
#[derive(Debug, Clone)]
pub struct Category {
    /// Display name, also the directory name under each root.
    pub name: String,
    /// Lowercased extensions (without dots) classified into this category.
    pub extensions: Vec<String>,
}

/// The result of classifying a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Top-level category name (e.g. "Documents").
    pub category: String,
    /// Second-level bucket, normally the uppercased extension (e.g. "PDF").
    pub subcategory: String,
}

/// Ordered, immutable extension-to-category mapping for one pass.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    categories: Vec<Category>,
    by_extension: HashMap<String, String>,
}

impl CategoryTable {
    fn build(categories: Vec<Category>) -> Self {
        let mut by_extension = HashMap::new();
        for category in &categories {
            for ext in &category.extensions {
                // First category listed for an extension wins.
                by_extension
                    .entry(ext.to_lowercase())
                    .or_insert_with(|| category.name.clone());
            }
        }
        Self {
            categories,
            by_extension,
        }
    }

    /// Load a category table from a JSON file mapping category names to
    /// extension lists:
    ///
    /// ```json
    /// { "Documents": ["pdf", "docx"], "Images": ["png", "jpg"] }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::CategoriesInvalid` when the file is not an
    /// object of string arrays, and `ConfigError::IoError` when it cannot
    /// be read.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let json: Value =
            serde_json::from_str(&content).map_err(|e| ConfigError::CategoriesInvalid {
                path: path.to_path_buf(),
                reason: format!("JSON parse error: {}", e),
            })?;

        let object = json
            .as_object()
            .ok_or_else(|| ConfigError::CategoriesInvalid {
                path: path.to_path_buf(),
                reason: "expected a top-level object of category names".to_string(),
            })?;

        let mut categories = Vec::new();
        for (name, extensions) in object {
            let array = extensions
                .as_array()
                .ok_or_else(|| ConfigError::CategoriesInvalid {
                    path: path.to_path_buf(),
                    reason: format!("category '{}' is not an array of extensions", name),
                })?;

            let extensions = array
                .iter()
                .map(|ext| {
                    ext.as_str()
                        .map(|s| s.trim_start_matches('.').to_lowercase())
                        .ok_or_else(|| ConfigError::CategoriesInvalid {
                            path: path.to_path_buf(),
                            reason: format!("category '{}' contains a non-string entry", name),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            categories.push(Category {
                name: name.clone(),
                extensions,
            });
        }

        Ok(Self::build(categories))
    }

    /// Classify a file by its extension and, when available, a sniffed MIME
    /// type. Pure function of the inputs and this table.
    ///
    /// Resolution order: extension lookup (case-insensitive), MIME-prefix
    /// fallback, then the `Others` fallback with the extension itself as
    /// subcategory (`Unknown` when the extension is empty).
    pub fn classify(&self, extension: Option<&str>, mime: Option<&str>) -> Classification {
        let extension = extension.map(str::trim).filter(|e| !e.is_empty());

        let subcategory = extension
            .map(str::to_uppercase)
            .unwrap_or_else(|| UNKNOWN_SUBCATEGORY.to_string());

        if let Some(ext) = extension
            && let Some(category) = self.by_extension.get(&ext.to_lowercase())
        {
            return Classification {
                category: category.clone(),
                subcategory,
            };
        }

        if let Some(mime) = mime
            && let Some(category) = category_for_mime(mime)
        {
            return Classification {
                category: category.to_string(),
                subcategory,
            };
        }

        Classification {
            category: FALLBACK_CATEGORY.to_string(),
            subcategory,
        }
    }

    /// The names of all configured categories.
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    /// Whether a directory name at the top of a root belongs to the
    /// organized category structure and must be skipped when scanning.
    pub fn is_category_dir(&self, name: &str) -> bool {
        name == FALLBACK_CATEGORY
            || name == FOLDERS_CATEGORY
            || self.categories.iter().any(|c| c.name == name)
    }
}

impl Default for CategoryTable {
    /// The built-in table, used when no `categories_file` is configured.
    fn default() -> Self {
        let defaults: &[(&str, &[&str])] = &[
            (
                "Documents",
                &[
                    "pdf", "doc", "docx", "txt", "rtf", "odt", "pages", "xls", "xlsx", "csv",
                ],
            ),
            (
                "Images",
                &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "svg", "heic"],
            ),
            ("Videos", &["mp4", "mov", "avi", "wmv", "mkv", "m4v"]),
            ("Audio", &["mp3", "wav", "aac", "flac", "m4a"]),
            ("Archives", &["zip", "rar", "7z", "tar", "gz"]),
            ("Applications", &["dmg", "app", "pkg", "exe"]),
            (
                "Code",
                &["py", "js", "java", "c", "cpp", "html", "css", "sql", "swift", "rs"],
            ),
        ];

        let categories = defaults
            .iter()
            .map(|(name, extensions)| Category {
                name: name.to_string(),
                extensions: extensions.iter().map(|e| e.to_string()).collect(),
            })
            .collect();

        Self::build(categories)
    }
}

/// Maps a MIME type to a category name for files whose extension is missing
/// or unrecognized.
fn category_for_mime(mime: &str) -> Option<&'static str> {
    let mime = mime.to_lowercase();
    let main_type = mime.split('/').next().unwrap_or_default();

    match main_type {
        "image" => Some("Images"),
        "video" => Some("Videos"),
        "audio" => Some("Audio"),
        "text" => Some("Documents"),
        "application" => {
            if mime.contains("pdf")
                || ["msword", "office", "document"].iter().any(|x| mime.contains(x))
            {
                Some("Documents")
            } else if ["zip", "compressed", "archive"].iter().any(|x| mime.contains(x)) {
                Some("Archives")
            } else if ["executable", "x-app"].iter().any(|x| mime.contains(x)) {
                Some("Applications")
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_classify_known_extension() {
        let table = CategoryTable::default();
        let c = table.classify(Some("pdf"), None);
        assert_eq!(c.category, "Documents");
        assert_eq!(c.subcategory, "PDF");
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        let table = CategoryTable::default();
        assert_eq!(table.classify(Some("JPG"), None).category, "Images");
        assert_eq!(table.classify(Some("Mp3"), None).category, "Audio");
    }

    #[test]
    fn test_classify_unknown_extension_falls_back() {
        let table = CategoryTable::default();
        let c = table.classify(Some("xyz"), None);
        assert_eq!(c.category, FALLBACK_CATEGORY);
        assert_eq!(c.subcategory, "XYZ");
    }

    #[test]
    fn test_classify_empty_extension_is_unknown() {
        let table = CategoryTable::default();
        for input in [None, Some(""), Some("  ")] {
            let c = table.classify(input, None);
            assert_eq!(c.category, FALLBACK_CATEGORY);
            assert_eq!(c.subcategory, UNKNOWN_SUBCATEGORY);
        }
    }

    #[test]
    fn test_classify_mime_fallback() {
        let table = CategoryTable::default();
        assert_eq!(table.classify(None, Some("image/webp")).category, "Images");
        assert_eq!(table.classify(None, Some("video/ogg")).category, "Videos");
        assert_eq!(table.classify(None, Some("text/markdown")).category, "Documents");
        assert_eq!(
            table.classify(None, Some("application/x-7z-compressed")).category,
            "Archives"
        );
    }

    #[test]
    fn test_extension_lookup_beats_mime() {
        let table = CategoryTable::default();
        let c = table.classify(Some("pdf"), Some("image/png"));
        assert_eq!(c.category, "Documents");
    }

    #[test]
    fn test_classify_never_errors() {
        let table = CategoryTable::default();
        // Totality: arbitrary garbage still produces a defined pair.
        let c = table.classify(Some("!!??"), Some("not-a-mime"));
        assert_eq!(c.category, FALLBACK_CATEGORY);
        assert_eq!(c.subcategory, "!!??");
    }

    #[test]
    fn test_category_dir_detection() {
        let table = CategoryTable::default();
        assert!(table.is_category_dir("Documents"));
        assert!(table.is_category_dir(FALLBACK_CATEGORY));
        assert!(table.is_category_dir(FOLDERS_CATEGORY));
        assert!(!table.is_category_dir("Vacation Photos"));
    }

    #[test]
    fn test_load_table_from_json() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{ "Notes": ["md", ".TXT"], "Pics": ["png"] }}"#
        )
        .expect("write json");

        let table = CategoryTable::load(file.path()).expect("valid table");
        assert_eq!(table.classify(Some("md"), None).category, "Notes");
        // Leading dots and case are normalized away.
        assert_eq!(table.classify(Some("txt"), None).category, "Notes");
        assert_eq!(table.classify(Some("png"), None).category, "Pics");
    }

    #[test]
    fn test_load_malformed_json_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{ not json").expect("write");
        assert!(CategoryTable::load(file.path()).is_err());
    }

    #[test]
    fn test_load_wrong_shape_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "Documents": "pdf" }}"#).expect("write");
        assert!(matches!(
            CategoryTable::load(file.path()),
            Err(ConfigError::CategoriesInvalid { .. })
        ));
    }
}
