use crate::error::{CascExtractError, Result};
use crate::storage::{Entry, EntrySearch, Storage, Wildcard};
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Serves the regular files below a directory as storage entries.
///
/// Entry paths are relative to the root and always use `/`.
#[derive(Debug)]
pub struct LooseStorage {
    root: PathBuf,
    closed: bool,
}

impl LooseStorage {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();

        let metadata = fs::metadata(root).map_err(|e| CascExtractError::StorageOpen {
            path: root.display().to_string(),
            message: e.to_string(),
            code: e.raw_os_error(),
        })?;

        if !metadata.is_dir() {
            return Err(CascExtractError::StorageOpen {
                path: root.display().to_string(),
                message: "not a directory".to_string(),
                code: None,
            });
        }

        debug!("Opened loose storage at {}", root.display());

        Ok(Self {
            root: root.to_path_buf(),
            closed: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve_entry(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        let mut resolved = self.root.clone();

        for part in path.split(['/', '\\']).filter(|p| !p.is_empty()) {
            match Path::new(part).components().next() {
                Some(Component::Normal(name)) => resolved.push(name),
                _ => return None,
            }
        }

        if relative.is_absolute() || resolved == self.root {
            None
        } else {
            Some(resolved)
        }
    }
}

impl Storage for LooseStorage {
    fn backend_name(&self) -> &'static str {
        "loose"
    }

    fn find<'a>(&'a self, pattern: &str) -> Result<Box<dyn EntrySearch + 'a>> {
        if self.closed {
            return Err(CascExtractError::Enumeration {
                pattern: pattern.to_string(),
                message: "storage is closed".to_string(),
                code: None,
            });
        }

        let wildcard = Wildcard::new(pattern)?;
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        Ok(Box::new(LooseSearch {
            root: &self.root,
            walker,
            wildcard,
        }))
    }

    fn open_entry<'a>(&'a self, path: &str, _locale: u32) -> Result<Box<dyn Read + 'a>> {
        let resolved = self
            .resolve_entry(path)
            .ok_or_else(|| CascExtractError::InvalidPath {
                path: path.to_string(),
            })?;

        let file = fs::File::open(&resolved).map_err(|e| CascExtractError::EntryOpen {
            path: path.to_string(),
            message: e.to_string(),
        })?;

        Ok(Box::new(file))
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

struct LooseSearch<'a> {
    root: &'a Path,
    walker: walkdir::IntoIter,
    wildcard: Wildcard,
}

impl LooseSearch<'_> {
    fn relative_name(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }
}

impl EntrySearch for LooseSearch<'_> {
    fn next_entry(&mut self) -> Result<Option<Entry>> {
        loop {
            let entry = match self.walker.next() {
                None => return Ok(None),
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    let code = e.io_error().and_then(|io| io.raw_os_error());
                    return Err(CascExtractError::Enumeration {
                        pattern: self.wildcard.pattern().to_string(),
                        message: e.to_string(),
                        code,
                    });
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(name) = self.relative_name(entry.path()) else {
                continue;
            };

            if self.wildcard.is_match(&name) {
                let plain_name = entry.file_name().to_string_lossy().into_owned();
                return Ok(Some(Entry::new(name).with_plain_name(plain_name)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_tree(files: &[(&str, &str)]) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        for (path, content) in files {
            let full = temp_dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        temp_dir
    }

    fn collect(storage: &LooseStorage, pattern: &str) -> Vec<String> {
        let mut search = storage.find(pattern).unwrap();
        let mut names = Vec::new();
        while let Some(entry) = search.next_entry().unwrap() {
            names.push(entry.path);
        }
        search.close().unwrap();
        names
    }

    #[test]
    fn test_open_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let result = LooseStorage::open(temp_dir.path().join("missing"));
        assert!(matches!(
            result,
            Err(CascExtractError::StorageOpen { code: Some(_), .. })
        ));
    }

    #[test]
    fn test_enumeration_is_sorted_and_relative() {
        let temp_dir = create_tree(&[
            ("readme.md", "hello"),
            ("data/global/excel/weapons.txt", "w"),
            ("data/global/excel/armor.txt", "a"),
        ]);
        let storage = LooseStorage::open(temp_dir.path()).unwrap();

        assert_eq!(
            collect(&storage, "*"),
            vec![
                "data/global/excel/armor.txt",
                "data/global/excel/weapons.txt",
                "readme.md",
            ]
        );
        assert_eq!(collect(&storage, "*.MD"), vec!["readme.md"]);
    }

    #[test]
    fn test_search_is_not_restartable_but_reopenable() {
        let temp_dir = create_tree(&[("a.txt", "a")]);
        let storage = LooseStorage::open(temp_dir.path()).unwrap();

        let mut search = storage.find("*").unwrap();
        assert!(search.next_entry().unwrap().is_some());
        assert!(search.next_entry().unwrap().is_none());
        assert!(search.next_entry().unwrap().is_none());

        assert_eq!(collect(&storage, "*"), vec!["a.txt"]);
    }

    #[test]
    fn test_open_entry_reads_content() {
        let temp_dir = create_tree(&[("data/global/excel/armor.txt", "name\tac\n")]);
        let storage = LooseStorage::open(temp_dir.path()).unwrap();

        let mut content = String::new();
        storage
            .open_entry("data\\global\\excel\\armor.txt", 0)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "name\tac\n");
    }

    #[test]
    fn test_open_entry_rejects_traversal() {
        let temp_dir = create_tree(&[("a.txt", "a")]);
        let storage = LooseStorage::open(temp_dir.path()).unwrap();

        assert!(matches!(
            storage.open_entry("../a.txt", 0),
            Err(CascExtractError::InvalidPath { .. })
        ));
        assert!(matches!(
            storage.open_entry("missing.txt", 0),
            Err(CascExtractError::EntryOpen { .. })
        ));
    }

    #[test]
    fn test_find_after_close_fails() {
        let temp_dir = create_tree(&[("a.txt", "a")]);
        let mut storage = LooseStorage::open(temp_dir.path()).unwrap();
        storage.close().unwrap();
        assert!(storage.find("*").is_err());
    }
}
