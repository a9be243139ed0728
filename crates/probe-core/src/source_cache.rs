//! Lazy cache of source-file lines.
//!
//! Keys are either a filesystem path or a DAP source reference. Line 1 is
//! stored at index 0. Entries are fetched once per key and kept until
//! [`SourceFileCache::flush`], which the engine invokes on session close.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

/// Cached source lines, keyed by path or source reference.
#[derive(Debug, Default)]
pub struct SourceFileCache {
    by_path: HashMap<String, Arc<Vec<String>>>,
    by_reference: HashMap<i64, Arc<Vec<String>>>,
}

impl SourceFileCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines of the file at `path`, read from disk on first use.
    ///
    /// A read failure yields a single human-readable error line; display
    /// logic treats the content as opaque either way.
    pub fn get_by_path(&mut self, path: &str) -> Arc<Vec<String>> {
        if let Some(lines) = self.by_path.get(path) {
            return lines.clone();
        }
        let lines = match std::fs::read_to_string(path) {
            Ok(text) => split_lines(&text),
            Err(e) => vec![format!("<error reading {path}: {e}>")],
        };
        let lines = Arc::new(lines);
        self.by_path.insert(path.to_string(), lines.clone());
        lines
    }

    /// Lines of the source behind a DAP source reference, fetched through
    /// `fetch` on first use.
    pub async fn get_by_reference<F, Fut, E>(&mut self, reference: i64, fetch: F) -> Arc<Vec<String>>
    where
        F: FnOnce(i64) -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: Display,
    {
        if let Some(lines) = self.by_reference.get(&reference) {
            return lines.clone();
        }
        let lines = match fetch(reference).await {
            Ok(text) => split_lines(&text),
            Err(e) => vec![format!("<error fetching source reference {reference}: {e}>")],
        };
        let lines = Arc::new(lines);
        self.by_reference.insert(reference, lines.clone());
        lines
    }

    /// Drop every cached entry.
    pub fn flush(&mut self) {
        self.by_path.clear();
        self.by_reference.clear();
    }

    /// Number of cached entries across both key spaces.
    pub fn len(&self) -> usize {
        self.by_path.len() + self.by_reference.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty() && self.by_reference.is_empty()
    }
}

/// The 1-based line `number` out of a cached line array.
pub fn line_at(lines: &[String], number: i64) -> Option<&str> {
    if number < 1 {
        return None;
    }
    lines.get((number - 1) as usize).map(String::as_str)
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("main.c");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path.to_string_lossy().into_owned())
    }

    #[test]
    fn cache_reads_lines_one_based() {
        let (_dir, path) = write_temp("first\nsecond\nthird\n");
        let mut cache = SourceFileCache::new();
        let lines = cache.get_by_path(&path);
        assert_eq!(lines.len(), 3);
        assert_eq!(line_at(&lines, 1), Some("first"));
        assert_eq!(line_at(&lines, 3), Some("third"));
        assert_eq!(line_at(&lines, 4), None);
        assert_eq!(line_at(&lines, 0), None);
    }

    #[test]
    fn cache_returns_identical_array_without_rereading() {
        let (dir, path) = write_temp("only line\n");
        let mut cache = SourceFileCache::new();
        let first = cache.get_by_path(&path);

        // Even deleting the file does not invalidate the cached entry.
        drop(dir);
        let second = cache.get_by_path(&path);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(line_at(&second, 1), Some("only line"));
    }

    #[test]
    fn cache_missing_file_yields_error_line() {
        let mut cache = SourceFileCache::new();
        let lines = cache.get_by_path("/no/such/file.c");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("<error reading /no/such/file.c"));
    }

    #[tokio::test]
    async fn cache_by_reference_fetches_once() {
        let mut cache = SourceFileCache::new();
        let mut calls = 0;

        let first = cache
            .get_by_reference(7, |_| {
                calls += 1;
                async { Ok::<_, std::io::Error>("a\nb".to_string()) }
            })
            .await;
        assert_eq!(first.as_slice(), ["a", "b"]);

        let second = cache
            .get_by_reference(7, |_| {
                calls += 1;
                async { Ok::<_, std::io::Error>(String::new()) }
            })
            .await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn cache_by_reference_failure_is_opaque_content() {
        let mut cache = SourceFileCache::new();
        let lines = cache
            .get_by_reference(3, |_| async {
                Err::<String, _>(std::io::Error::other("adapter gone"))
            })
            .await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("source reference 3"));
        assert!(lines[0].contains("adapter gone"));
    }

    #[tokio::test]
    async fn cache_flush_empties_all_entries() {
        let (_dir, path) = write_temp("x\n");
        let mut cache = SourceFileCache::new();
        cache.get_by_path(&path);
        cache
            .get_by_reference(1, |_| async { Ok::<_, std::io::Error>("y".to_string()) })
            .await;
        assert_eq!(cache.len(), 2);

        cache.flush();
        assert!(cache.is_empty());
    }
}
