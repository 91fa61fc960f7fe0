//! The filesystem protocol and the in-memory backend.
//!
//! The interpreter sees only this trait; what "the filesystem" means is the
//! host's choice. All guest file operations flow through the context, which
//! records them in the event log.

use indexmap::IndexMap;

/// Write disposition for [`FileSystem::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the file's contents.
    Write,
    /// Concatenate onto the existing contents (creating the file if absent).
    Append,
}

/// The pluggable filesystem boundary. Errors are plain messages; the
/// interpreter wraps them in the appropriate guest exception kind.
pub trait FileSystem {
    fn read(&self, path: &str) -> Result<String, String>;
    fn write(&mut self, path: &str, content: &str, mode: WriteMode) -> Result<(), String>;
    fn list_dir(&self, path: &str) -> Result<Vec<String>, String>;
}

/// An in-memory filesystem: flat path → content map with `/`-separated
/// directory semantics for `list_dir`.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    files: IndexMap<String, String>,
}

impl MemFs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        Self {
            files: files.into_iter().map(|(p, c)| (p.into(), c.into())).collect(),
        }
    }

    /// Direct access for hosts inspecting results after a run.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }
}

impl FileSystem for MemFs {
    fn read(&self, path: &str) -> Result<String, String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| format!("No such file or directory: '{path}'"))
    }

    fn write(&mut self, path: &str, content: &str, mode: WriteMode) -> Result<(), String> {
        match mode {
            WriteMode::Write => {
                self.files.insert(path.to_string(), content.to_string());
            }
            WriteMode::Append => {
                self.files.entry(path.to_string()).or_default().push_str(content);
            }
        }
        Ok(())
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>, String> {
        let prefix = if path.is_empty() || path == "." {
            String::new()
        } else {
            format!("{}/", path.trim_end_matches('/'))
        };
        let mut names: Vec<String> = Vec::new();
        for key in self.files.keys() {
            if let Some(rest) = key.strip_prefix(&prefix) {
                let name = rest.split('/').next().unwrap_or(rest);
                if !name.is_empty() && !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        if names.is_empty() && !prefix.is_empty() {
            return Err(format!("No such file or directory: '{path}'"));
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_concatenates() {
        let mut fs = MemFs::new();
        fs.write("log.txt", "a", WriteMode::Append).unwrap();
        fs.write("log.txt", "b", WriteMode::Append).unwrap();
        assert_eq!(fs.read("log.txt").unwrap(), "ab");
        fs.write("log.txt", "c", WriteMode::Write).unwrap();
        assert_eq!(fs.read("log.txt").unwrap(), "c");
    }

    #[test]
    fn list_dir_splits_on_separators() {
        let fs = MemFs::with_files([
            ("data/a.csv", ""),
            ("data/b.csv", ""),
            ("data/sub/c.csv", ""),
            ("top.txt", ""),
        ]);
        let mut names = fs.list_dir("data").unwrap();
        names.sort();
        assert_eq!(names, ["a.csv", "b.csv", "sub"]);
        assert_eq!(fs.list_dir("").unwrap(), ["data", "top.txt"]);
        assert!(fs.list_dir("missing").is_err());
    }
}
