//! Candidate discovery: explicit files, directory walks and dropped path
//! lists.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::LoadConfig;

use super::cancel::CancellationToken;

/// Walk errors reported individually before the rest are only counted.
const LOGGED_SCAN_ERRORS: usize = 10;

/// Where a load session's candidates come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadRequest {
    /// Explicit paths, loaded as given (no filtering, no scan)
    Paths(Vec<PathBuf>),
    /// Recursive walk of one directory
    Directory(PathBuf),
    /// Mixed drop: files filtered by the selectable list, directories
    /// walked with the recursive list
    Drop {
        files: Vec<PathBuf>,
        dirs: Vec<PathBuf>,
    },
}

impl LoadRequest {
    /// Split mixed command-line or drop input into files and directories.
    pub fn from_inputs(inputs: &[PathBuf]) -> Self {
        let (dirs, files): (Vec<PathBuf>, Vec<PathBuf>) =
            dedupe_paths(inputs).into_iter().partition(|p| p.is_dir());
        LoadRequest::Drop { files, dirs }
    }
}

/// Result of the scan phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Candidates, deduplicated case-insensitively and sorted
    pub candidates: Vec<PathBuf>,
    /// The `max_files` cap was hit
    pub reached_limit: bool,
}

/// Scan was interrupted by the cancellation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

/// Remove duplicate paths (case-insensitive), keeping first occurrences.
pub fn dedupe_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .iter()
        .filter(|p| seen.insert(path_key(p)))
        .cloned()
        .collect()
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            extensions
                .iter()
                .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
        })
        .unwrap_or(false)
}

/// Whether `path` has one of the explicitly selectable extensions.
pub fn is_selectable_input_file(path: &Path, config: &LoadConfig) -> bool {
    has_extension(path, &config.selectable_extensions)
}

/// Collects candidates while enforcing dedupe, the cap and progress ticks.
struct Collector<'a, F: FnMut(usize)> {
    seen: HashSet<String>,
    candidates: Vec<PathBuf>,
    max_files: usize,
    progress_every: usize,
    on_progress: &'a mut F,
    reached_limit: bool,
}

impl<F: FnMut(usize)> Collector<'_, F> {
    /// Returns false once the cap is reached.
    fn add(&mut self, path: PathBuf) -> bool {
        if !self.seen.insert(path_key(&path)) {
            return true;
        }
        self.candidates.push(path);
        let detected = self.candidates.len();
        if self.progress_every > 0 && detected % self.progress_every == 0 {
            (self.on_progress)(detected);
        }
        if self.max_files > 0 && detected >= self.max_files {
            self.reached_limit = true;
            return false;
        }
        true
    }

    fn finish(mut self) -> Discovery {
        self.candidates.sort_by_key(|p| path_key(p));
        Discovery {
            candidates: self.candidates,
            reached_limit: self.reached_limit,
        }
    }
}

/// Finds load candidates for a `LoadRequest`.
pub struct FileDiscovery {
    config: LoadConfig,
}

impl FileDiscovery {
    pub fn new(config: LoadConfig) -> Self {
        Self { config }
    }

    /// Run the scan phase.
    ///
    /// `on_progress` receives the running candidate count every
    /// `scan_progress_every` detections. Checks `cancel` at file
    /// granularity.
    pub fn discover<F: FnMut(usize)>(
        &self,
        request: &LoadRequest,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<Discovery, Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        let (files, dirs) = match request {
            LoadRequest::Paths(paths) => {
                return Ok(Discovery {
                    candidates: paths.clone(),
                    reached_limit: false,
                })
            }
            LoadRequest::Directory(root) => (&[][..], std::slice::from_ref(root)),
            LoadRequest::Drop { files, dirs } => (files.as_slice(), dirs.as_slice()),
        };

        let mut collector = Collector {
            seen: HashSet::new(),
            candidates: Vec::new(),
            max_files: self.config.max_files,
            progress_every: self.config.scan_progress_every,
            on_progress: &mut on_progress,
            reached_limit: false,
        };

        for path in files {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }
            if path.is_file()
                && is_selectable_input_file(path, &self.config)
                && !collector.add(path.clone())
            {
                break;
            }
        }

        let mut scan_errors = 0usize;
        'roots: for root in dirs {
            if collector.reached_limit {
                break;
            }
            for entry in WalkDir::new(root).follow_links(false) {
                if cancel.is_cancelled() {
                    return Err(Cancelled);
                }
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        scan_errors += 1;
                        if scan_errors <= LOGGED_SCAN_ERRORS {
                            tracing::warn!("Recursive scan warning: {}", e);
                        }
                        continue;
                    }
                };
                if entry.file_type().is_file()
                    && has_extension(entry.path(), &self.config.recursive_extensions)
                    && !collector.add(entry.into_path())
                {
                    break 'roots;
                }
            }
        }
        if scan_errors > LOGGED_SCAN_ERRORS {
            tracing::warn!(
                "{} more scan errors not shown",
                scan_errors - LOGGED_SCAN_ERRORS
            );
        }

        Ok(collector.finish())
    }
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Normalize one dropped path text item; `file://` URIs become paths.
pub fn normalize_dropped_path_text(value: &str) -> String {
    let text = value.trim();
    let Some(rest) = text.strip_prefix("file://") else {
        return text.to_string();
    };

    let (host, path) = match rest.find('/') {
        Some(pos) => rest.split_at(pos),
        None => (rest, ""),
    };
    let mut normalized = percent_decode(path);
    if !host.is_empty() && !host.eq_ignore_ascii_case("localhost") {
        normalized = format!("//{}{}", host, normalized);
    }
    let b = normalized.as_bytes();
    if cfg!(windows) && b.len() >= 3 && b[0] == b'/' && b[2] == b':' {
        normalized.remove(0);
    }
    if normalized.is_empty() {
        text.to_string()
    } else {
        normalized
    }
}

/// Parse newline-separated dropped text (optionally `{braced}` or quoted
/// items) into a deduplicated path list.
pub fn parse_path_list(raw: &str) -> Vec<PathBuf> {
    let paths: Vec<PathBuf> = raw
        .lines()
        .map(str::trim)
        .map(|item| {
            item.strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                .unwrap_or(item)
        })
        .map(|item| item.trim().trim_matches('"'))
        .map(normalize_dropped_path_text)
        .filter(|item| !item.is_empty())
        .map(PathBuf::from)
        .collect();
    dedupe_paths(&paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config(max_files: usize) -> LoadConfig {
        LoadConfig {
            max_files,
            scan_progress_every: 2,
            ..LoadConfig::default()
        }
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_directory_walk_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.JPG"));
        touch(&dir.path().join("sub/a.png"));
        touch(&dir.path().join("sub/c.webp"));
        touch(&dir.path().join("notes.txt"));

        let discovery = FileDiscovery::new(config(0));
        let mut ticks = Vec::new();
        let found = discovery
            .discover(
                &LoadRequest::Directory(dir.path().to_path_buf()),
                &CancellationToken::new(),
                |n| ticks.push(n),
            )
            .unwrap();

        // webp is selectable but not picked up by directory walks
        assert_eq!(
            found.candidates,
            vec![dir.path().join("b.JPG"), dir.path().join("sub/a.png")]
        );
        assert!(!found.reached_limit);
        assert_eq!(ticks, vec![2]);
    }

    #[test]
    fn test_max_files_cap() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            touch(&dir.path().join(format!("{i}.jpg")));
        }
        let found = FileDiscovery::new(config(3))
            .discover(
                &LoadRequest::Directory(dir.path().to_path_buf()),
                &CancellationToken::new(),
                |_| {},
            )
            .unwrap();
        assert_eq!(found.candidates.len(), 3);
        assert!(found.reached_limit);
    }

    #[test]
    fn test_drop_dedupes_across_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("photo.jpg");
        touch(&photo);
        touch(&dir.path().join("readme.md"));

        let request = LoadRequest::Drop {
            files: vec![photo.clone(), dir.path().join("readme.md")],
            dirs: vec![dir.path().to_path_buf()],
        };
        let found = FileDiscovery::new(config(0))
            .discover(&request, &CancellationToken::new(), |_| {})
            .unwrap();
        assert_eq!(found.candidates, vec![photo]);
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_root_is_tolerated() {
        let found = FileDiscovery::new(config(0))
            .discover(
                &LoadRequest::Directory(PathBuf::from("/definitely/not/here")),
                &CancellationToken::new(),
                |_| {},
            )
            .unwrap();
        assert!(found.candidates.is_empty());
    }

    #[test]
    fn test_cancelled_before_scan() {
        let token = CancellationToken::new();
        token.cancel();
        let result = FileDiscovery::new(config(0)).discover(
            &LoadRequest::Paths(vec![PathBuf::from("a.jpg")]),
            &token,
            |_| {},
        );
        assert_eq!(result, Err(Cancelled));
    }

    #[test]
    fn test_dedupe_paths_case_insensitive() {
        let paths = vec![
            PathBuf::from("/A/x.jpg"),
            PathBuf::from("/a/X.JPG"),
            PathBuf::from("/b.png"),
        ];
        assert_eq!(
            dedupe_paths(&paths),
            vec![PathBuf::from("/A/x.jpg"), PathBuf::from("/b.png")]
        );
    }

    #[test]
    fn test_file_uri_normalization() {
        assert_eq!(
            normalize_dropped_path_text("file:///home/me/My%20Photo.jpg"),
            "/home/me/My Photo.jpg"
        );
        assert_eq!(
            normalize_dropped_path_text("file://localhost/tmp/a.png"),
            "/tmp/a.png"
        );
        assert_eq!(
            normalize_dropped_path_text("file://nas/share/a.png"),
            "//nas/share/a.png"
        );
        assert_eq!(normalize_dropped_path_text("  /plain/path.jpg "), "/plain/path.jpg");
    }

    #[test]
    fn test_parse_path_list() {
        let raw = "{/tmp/a b.jpg}\n\"/tmp/c.png\"\n\n/tmp/C.PNG\nfile:///tmp/d%2Be.jpg";
        assert_eq!(
            parse_path_list(raw),
            vec![
                PathBuf::from("/tmp/a b.jpg"),
                PathBuf::from("/tmp/c.png"),
                PathBuf::from("/tmp/d+e.jpg"),
            ]
        );
    }
}
