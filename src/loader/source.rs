//! Byte sources for model and texture URLs.
//!
//! Fetching is asynchronous and never touches scene state; callers apply the
//! result once the future resolves.

use std::cell::Cell;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use futures::future::{FutureExt, LocalBoxFuture};

/// Transfer progress for one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: u64,
    /// Known only when the source can report a length up front
    pub total: Option<u64>,
}

impl LoadProgress {
    /// Fraction complete in `[0, 1]`, or `None` when the total is unknown
    pub fn ratio(&self) -> Option<f32> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some((self.loaded as f64 / total as f64).clamp(0.0, 1.0) as f32),
            None => None,
        }
    }
}

pub type ProgressFn<'a> = &'a mut dyn FnMut(LoadProgress);

/// Somewhere model and texture bytes come from
pub trait AssetSource {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        progress: ProgressFn<'a>,
    ) -> LocalBoxFuture<'a, anyhow::Result<Vec<u8>>>;
}

/// Strips `file://` and any query or fragment from a URL
pub fn url_path(url: &str) -> &str {
    let without_scheme = url.strip_prefix("file://").unwrap_or(url);
    let end = without_scheme
        .find(|c: char| c == '?' || c == '#')
        .unwrap_or(without_scheme.len());
    &without_scheme[..end]
}

/// Directory part of a URL, used to resolve sibling resources
pub fn base_dir(url: &str) -> Option<PathBuf> {
    Path::new(url_path(url)).parent().map(Path::to_path_buf)
}

/// Reads local files and `file://` URLs in fixed-size chunks
pub struct FileSource {
    root: Option<PathBuf>,
    chunk_size: usize,
}

impl FileSource {
    pub fn new() -> Self {
        Self {
            root: None,
            chunk_size: 64 * 1024,
        }
    }

    /// Resolve relative URLs against `root`
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn resolve(&self, url: &str) -> PathBuf {
        let path = Path::new(url_path(url));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn read(&self, url: &str, progress: ProgressFn<'_>) -> anyhow::Result<Vec<u8>> {
        if url.contains("://") && !url.starts_with("file://") {
            bail!("FileSource cannot fetch remote URL '{}'", url);
        }

        let path = self.resolve(url);
        let mut file =
            File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
        let total = file.metadata().ok().map(|m| m.len());

        let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut chunk = vec![0u8; self.chunk_size];
        loop {
            let n = file
                .read(&mut chunk)
                .with_context(|| format!("failed to read {}", path.display()))?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
            progress(LoadProgress {
                loaded: bytes.len() as u64,
                total,
            });
        }
        Ok(bytes)
    }
}

impl Default for FileSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetSource for FileSource {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        progress: ProgressFn<'a>,
    ) -> LocalBoxFuture<'a, anyhow::Result<Vec<u8>>> {
        async move { self.read(url, progress) }.boxed_local()
    }
}

/// In-memory assets keyed by URL, for embedding hosts and tests
pub struct MemorySource {
    assets: HashMap<String, Vec<u8>>,
    report_total: bool,
    fetches: Cell<usize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            assets: HashMap::new(),
            report_total: true,
            fetches: Cell::new(0),
        }
    }

    pub fn with_asset(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.insert(url, bytes);
        self
    }

    /// Withhold the content length, as a chunked HTTP response would
    pub fn without_total(mut self) -> Self {
        self.report_total = false;
        self
    }

    pub fn insert(&mut self, url: &str, bytes: Vec<u8>) {
        self.assets.insert(url.to_string(), bytes);
    }

    /// Number of fetches attempted so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetSource for MemorySource {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        progress: ProgressFn<'a>,
    ) -> LocalBoxFuture<'a, anyhow::Result<Vec<u8>>> {
        async move {
            self.fetches.set(self.fetches.get() + 1);
            let bytes = self
                .assets
                .get(url)
                .cloned()
                .with_context(|| format!("no asset registered for '{url}'"))?;
            let total = self.report_total.then_some(bytes.len() as u64);
            let half = bytes.len() as u64 / 2;
            progress(LoadProgress { loaded: half, total });
            progress(LoadProgress {
                loaded: bytes.len() as u64,
                total,
            });
            Ok(bytes)
        }
        .boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_url_path_strips_query_and_scheme() {
        assert_eq!(url_path("file:///tmp/a.glb?v=2#top"), "/tmp/a.glb");
        assert_eq!(url_path("models/a.obj"), "models/a.obj");
    }

    #[test]
    fn test_ratio() {
        let p = LoadProgress { loaded: 50, total: Some(200) };
        assert_eq!(p.ratio(), Some(0.25));
        assert_eq!(LoadProgress { loaded: 5, total: None }.ratio(), None);
    }

    #[test]
    fn test_file_source_reports_chunks() {
        let dir = std::env::temp_dir().join(format!("model-viewer-src-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("blob.bin");
        let mut file = File::create(&path).unwrap();
        file.write_all(&[7u8; 10]).unwrap();

        let source = FileSource::new().with_chunk_size(4);
        let mut ticks = Vec::new();
        let bytes = pollster::block_on(
            source.fetch(path.to_str().unwrap(), &mut |p: LoadProgress| ticks.push(p.loaded)),
        )
        .unwrap();

        assert_eq!(bytes.len(), 10);
        assert_eq!(ticks, vec![4, 8, 10]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_file_source_rejects_remote() {
        let source = FileSource::new();
        let result = pollster::block_on(source.fetch("https://example.com/a.glb", &mut |_: LoadProgress| {}));
        assert!(result.is_err());
    }

    #[test]
    fn test_memory_source_missing_asset() {
        let source = MemorySource::new();
        let result = pollster::block_on(source.fetch("missing.glb", &mut |_: LoadProgress| {}));
        assert!(result.is_err());
        assert_eq!(source.fetch_count(), 1);
    }
}
