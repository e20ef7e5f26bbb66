use crate::model::Language;
use anyhow::Result;
use log::{debug, warn};
use std::path::PathBuf;
use walkdir::WalkDir;

/// Directories that hold build output, dependencies or tool state, never sources
const SKIPPED_DIRS: &[&str] = &[
    "target",
    "node_modules",
    "vendor",
    "__pycache__",
    "venv",
    "dist-newstyle",
    "build",
];

/// File scanner for traversing project directories.
///
/// The `FileScanner` recursively walks a project directory and collects every
/// file whose extension maps to a supported [`Language`]. Hidden directories and
/// the dependency/build directories of the supported ecosystems are skipped.
///
/// # Example
///
/// ```no_run
/// use routescope::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./my-project"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} source files", result.files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
}

/// Result of directory scanning operation.
pub struct ScanResult {
    /// Discovered source files, sorted by path
    pub files: Vec<PathBuf>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl FileScanner {
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Scans the directory tree and collects all supported source files.
    ///
    /// If any directories or files cannot be accessed, warnings are logged and added to
    /// the result, but scanning continues. The file list is sorted so that every run
    /// visits files in the same order.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path)
            .into_iter()
            .filter_entry(|e| {
                // Don't filter the root directory itself
                if e.path() == self.root_path {
                    return true;
                }
                if !e.file_type().is_dir() {
                    return true;
                }

                let file_name = e.file_name().to_string_lossy();
                !file_name.starts_with('.') && !SKIPPED_DIRS.contains(&file_name.as_ref())
            })
        {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && Language::from_path(path).is_some() {
                        files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        files.sort();
        debug!("Scanned {} source files under {}", files.len(), self.root_path.display());

        Ok(ScanResult { files, warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn file_names(result: &ScanResult) -> Vec<String> {
        result
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_scan_collects_every_supported_language() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        for name in [
            "main.rs", "main.go", "app.js", "server.ts", "app.py", "Api.java", "Api.hs",
            "readme.md", "config.toml",
        ] {
            fs::write(root.join(name), "").unwrap();
        }

        let result = FileScanner::new(root.to_path_buf()).scan().unwrap();

        assert_eq!(result.files.len(), 7);
        assert!(result.warnings.is_empty());
        assert!(!file_names(&result).contains(&"readme.md".to_string()));
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = FileScanner::new(temp_dir.path().to_path_buf()).scan().unwrap();

        assert!(result.files.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scan_nested_directories_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("src/models")).unwrap();
        fs::write(root.join("src/models/user.rs"), "struct User {}").unwrap();
        fs::write(root.join("src/lib.rs"), "pub fn test() {}").unwrap();
        fs::write(root.join("main.rs"), "fn main() {}").unwrap();

        let result = FileScanner::new(root.to_path_buf()).scan().unwrap();

        assert_eq!(result.files.len(), 3);
        let mut sorted = result.files.clone();
        sorted.sort();
        assert_eq!(result.files, sorted);
    }

    #[test]
    fn test_scan_skips_dependency_and_hidden_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        for dir in ["target", "node_modules/express", ".git", "venv/lib", "__pycache__"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        fs::write(root.join("target/build.rs"), "fn main() {}").unwrap();
        fs::write(root.join("node_modules/express/index.js"), "").unwrap();
        fs::write(root.join(".git/hook.py"), "").unwrap();
        fs::write(root.join("venv/lib/site.py"), "").unwrap();
        fs::write(root.join("__pycache__/app.py"), "").unwrap();
        fs::write(root.join("main.rs"), "fn main() {}").unwrap();

        let result = FileScanner::new(root.to_path_buf()).scan().unwrap();

        assert_eq!(file_names(&result), vec!["main.rs".to_string()]);
    }
}
