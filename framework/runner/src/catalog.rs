use itertools::Itertools;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Scenario catalog {path} is not a directory")]
    NotADirectory { path: PathBuf },
    #[error("Cannot read scenario catalog {path}: {source}")]
    Catalog {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Cannot read skip list {path}, refusing to run scenarios that may have been excluded: {source}")]
    SkipList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The fixed set of scenarios that can be run, minus those on the skip list.
#[derive(Debug, Clone)]
pub struct ScenarioCatalog {
    dir: PathBuf,
    skip_file: PathBuf,
}

impl ScenarioCatalog {
    pub fn new(dir: impl Into<PathBuf>, skip_file: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            skip_file: skip_file.into(),
        }
    }

    /// List the runnable scenarios, in file name order.
    ///
    /// Fails if either the catalog directory or the skip list cannot be read. A missing skip list
    /// is not treated as an empty one.
    pub fn list_scenarios(&self) -> Result<Vec<String>, CatalogError> {
        let catalog = read_catalog(&self.dir)?;
        let skip_list = std::fs::read_to_string(&self.skip_file).map_err(|source| {
            CatalogError::SkipList {
                path: self.skip_file.clone(),
                source,
            }
        })?;

        let scenarios = filter_skipped(catalog, &parse_skip_list(&skip_list));
        log::debug!(
            "Found {} runnable scenarios in {}",
            scenarios.len(),
            self.dir.display()
        );

        Ok(scenarios)
    }
}

/// Remove every skipped name, keeping the catalog order of the rest.
pub fn filter_skipped<S: AsRef<str>>(catalog: Vec<String>, skip_list: &[S]) -> Vec<String> {
    let skip = skip_list.iter().map(AsRef::as_ref).collect::<HashSet<&str>>();

    catalog
        .into_iter()
        .filter(|name| !skip.contains(name.as_str()))
        .collect()
}

/// Names listed in a skip file. Blank lines and `#` comments are ignored.
pub fn parse_skip_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn read_catalog(dir: &Path) -> Result<Vec<String>, CatalogError> {
    if !dir.is_dir() {
        return Err(CatalogError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let mut names = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| CatalogError::Catalog {
            path: dir.to_path_buf(),
            source,
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        if let Some(name) = scenario_name(entry.path()) {
            names.push(name);
        }
    }

    Ok(names.into_iter().unique().collect())
}

fn scenario_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    if file_name.starts_with('.') {
        return None;
    }

    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn filter_is_set_difference_in_catalog_order() {
        let catalog = names(&["d", "a", "c", "b"]);

        assert_eq!(names(&["d", "c"]), filter_skipped(catalog.clone(), &["b", "a"]));
        assert_eq!(names(&["d", "c"]), filter_skipped(catalog.clone(), &["a", "b", "a"]));
        assert_eq!(catalog.clone(), filter_skipped(catalog.clone(), &[] as &[&str]));
        assert_eq!(names(&["d", "a", "c", "b"]), filter_skipped(catalog, &["z"]));
    }

    #[test]
    fn skip_list_ignores_comments_and_blank_lines() {
        let content = "# flaky on CI\nname_import\n\n  wallet_test  \n#name_preorder\n";

        assert_eq!(names(&["name_import", "wallet_test"]), parse_skip_list(content));
    }

    #[test]
    fn lists_catalog_minus_skip_list() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = dir.path().join("scenarios");
        std::fs::create_dir(&catalog).unwrap();
        for file in ["c.py", "a.py", "b.py", ".hidden.py"] {
            std::fs::write(catalog.join(file), "").unwrap();
        }
        std::fs::create_dir(catalog.join("data")).unwrap();
        let skip_file = dir.path().join("skip.txt");
        std::fs::write(&skip_file, "# skipped\nb\n").unwrap();

        let scenarios = ScenarioCatalog::new(&catalog, &skip_file)
            .list_scenarios()
            .unwrap();

        assert_eq!(names(&["a", "c"]), scenarios);
    }

    #[test]
    fn duplicate_stems_are_listed_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "").unwrap();
        std::fs::write(dir.path().join("a.sh"), "").unwrap();
        let skip_dir = tempfile::tempdir().unwrap();
        let skip_file = skip_dir.path().join("skip.txt");
        std::fs::write(&skip_file, "").unwrap();

        let scenarios = ScenarioCatalog::new(dir.path(), &skip_file)
            .list_scenarios()
            .unwrap();

        assert_eq!(names(&["a"]), scenarios);
    }

    #[test]
    fn missing_skip_list_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "").unwrap();

        let err = ScenarioCatalog::new(dir.path(), dir.path().join("missing.txt"))
            .list_scenarios()
            .unwrap_err();

        assert!(matches!(err, CatalogError::SkipList { .. }));
    }

    #[test]
    fn missing_catalog_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let skip_file = dir.path().join("skip.txt");
        std::fs::write(&skip_file, "").unwrap();

        let err = ScenarioCatalog::new(dir.path().join("nope"), &skip_file)
            .list_scenarios()
            .unwrap_err();

        assert!(matches!(err, CatalogError::NotADirectory { .. }));
    }
}
