use crate::config::{FilterConfig, FilterMode};
use crate::error::{CascExtractError, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Converts every `\` into `/`.
pub fn normalize_path(raw: &str) -> String {
    raw.replace('\\', "/")
}

/// Splits a leading `name:` prefix (as in `data:data/global/...`) off a path.
///
/// A prefix is a non-empty run of ASCII alphanumerics or `_` followed by `:`,
/// appearing before any separator.
pub fn split_protocol_prefix(path: &str) -> (Option<&str>, &str) {
    if let Some(pos) = path.find(':') {
        let prefix = &path[..pos];
        let is_prefix = !prefix.is_empty()
            && prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');

        if is_prefix {
            return (Some(prefix), &path[pos + 1..]);
        }
    }
    (None, path)
}

#[derive(Debug, Clone)]
pub enum FilterStrategy {
    Rules {
        suffix: String,
        include: String,
        exclude: String,
    },
    Listfile(HashSet<String>),
}

pub struct PathFilter {
    strategy: FilterStrategy,
}

impl PathFilter {
    pub fn new(strategy: FilterStrategy) -> Self {
        Self { strategy }
    }

    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        let strategy = match config.mode {
            FilterMode::Rules => FilterStrategy::Rules {
                suffix: config.suffix.clone(),
                include: config.include.clone(),
                exclude: config.exclude.clone(),
            },
            FilterMode::Listfile => {
                let path = config.listfile.as_ref().ok_or_else(|| CascExtractError::Config {
                    message: "Listfile filter mode requires a listfile path".to_string(),
                })?;
                FilterStrategy::Listfile(load_listfile(path)?)
            }
        };

        Ok(Self::new(strategy))
    }

    /// Include decision for an already normalized path.
    pub fn matches(&self, path: &str) -> bool {
        match &self.strategy {
            FilterStrategy::Rules {
                suffix,
                include,
                exclude,
            } => {
                path.len() > suffix.len()
                    && path.ends_with(suffix.as_str())
                    && path.contains(include.as_str())
                    && (exclude.is_empty() || !path.contains(exclude.as_str()))
            }
            FilterStrategy::Listfile(allowed) => allowed.contains(path),
        }
    }

    pub fn strategy(&self) -> &FilterStrategy {
        &self.strategy
    }

    pub fn describe(&self) -> String {
        match &self.strategy {
            FilterStrategy::Rules {
                suffix,
                include,
                exclude,
            } => {
                if exclude.is_empty() {
                    format!("*{} under '{}'", suffix, include)
                } else {
                    format!("*{} under '{}' excluding '{}'", suffix, include, exclude)
                }
            }
            FilterStrategy::Listfile(allowed) => {
                format!("listfile with {} paths", allowed.len())
            }
        }
    }
}

pub fn load_listfile(path: &Path) -> Result<HashSet<String>> {
    let content = fs::read_to_string(path).map_err(|e| CascExtractError::Listfile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(parse_listfile(&content))
}

pub fn parse_listfile(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rules_filter() -> PathFilter {
        PathFilter::from_config(&FilterConfig::default()).unwrap()
    }

    #[test]
    fn test_separator_normalization() {
        assert_eq!(normalize_path("a\\b\\c.txt"), "a/b/c.txt");
        assert_eq!(normalize_path("a/b/c.txt"), "a/b/c.txt");
        assert_eq!(normalize_path("a\\b/c.txt"), normalize_path("a/b\\c.txt"));
    }

    #[test]
    fn test_protocol_prefix() {
        assert_eq!(
            split_protocol_prefix("data:data/global/excel/armor.txt"),
            (Some("data"), "data/global/excel/armor.txt")
        );
        assert_eq!(split_protocol_prefix("data/global/a.txt"), (None, "data/global/a.txt"));
        assert_eq!(split_protocol_prefix("data/x:y.txt"), (None, "data/x:y.txt"));
        assert_eq!(split_protocol_prefix(":a.txt"), (None, ":a.txt"));
    }

    #[test]
    fn test_rules_filter() {
        let filter = rules_filter();

        assert!(filter.matches("data/global/excel/x.txt"));
        assert!(filter.matches("data:data/global/ui/layouts/y.txt"));
        assert!(!filter.matches("data/global/excel/base/x.txt"));
        assert!(!filter.matches("data/other/x.txt"));
        assert!(!filter.matches("data/global/excel/x.json"));
    }

    #[test]
    fn test_short_paths_are_excluded() {
        let filter = rules_filter();

        assert!(!filter.matches(""));
        assert!(!filter.matches("t"));
        assert!(!filter.matches(".tx"));
        assert!(!filter.matches(".txt"));
    }

    #[test]
    fn test_empty_exclude_disables_exclusion() {
        let filter = PathFilter::new(FilterStrategy::Rules {
            suffix: ".txt".to_string(),
            include: "data/global".to_string(),
            exclude: String::new(),
        });

        assert!(filter.matches("data/global/excel/base/x.txt"));
        assert!(filter.describe().contains("data/global"));
    }

    #[test]
    fn test_listfile_filter_is_exact() {
        let allowed = parse_listfile("data/global/excel/armor.txt\r\n\ndata/global/excel/misc.txt\n");
        assert_eq!(allowed.len(), 2);

        let filter = PathFilter::new(FilterStrategy::Listfile(allowed));
        assert!(filter.matches("data/global/excel/armor.txt"));
        assert!(filter.matches("data/global/excel/misc.txt"));
        assert!(!filter.matches("data/global/excel/ARMOR.txt"));
        assert!(!filter.matches("data/global/excel/armor.txt "));
        assert_eq!(filter.describe(), "listfile with 2 paths");
    }

    #[test]
    fn test_listfile_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let listfile = temp_dir.path().join("wanted.txt");
        fs::write(&listfile, "data/global/excel/armor.txt\n").unwrap();

        let config = FilterConfig {
            mode: FilterMode::Listfile,
            listfile: Some(listfile),
            ..FilterConfig::default()
        };

        let filter = PathFilter::from_config(&config).unwrap();
        assert!(filter.matches("data/global/excel/armor.txt"));
        assert!(!filter.matches("data/global/excel/weapons.txt"));
    }

    #[test]
    fn test_missing_listfile() {
        let config = FilterConfig {
            mode: FilterMode::Listfile,
            listfile: Some("does/not/exist.txt".into()),
            ..FilterConfig::default()
        };

        assert!(matches!(
            PathFilter::from_config(&config),
            Err(CascExtractError::Listfile { .. })
        ));
    }
}
