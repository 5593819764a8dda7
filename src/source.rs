// source.rs - resolves a media source string into something a loader can open
//
// Accepted forms:
// - anything starting with `file`, or an absolute path: local file
// - anything starting with `http`: network URL (not fetched by this crate)
// - anything else: name of a bundled resource under assets/media/

use crate::error::SourceError;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    File(PathBuf),
    Url(String),
    Resource(String),
}

impl MediaSource {
    pub fn parse(source: &str) -> Result<Self, SourceError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(SourceError::Empty);
        }

        if source.starts_with("file") {
            let path = source.strip_prefix("file:").unwrap_or(source);
            let path = path.strip_prefix("//").unwrap_or(path);
            return Ok(Self::File(PathBuf::from(path)));
        }
        if source.starts_with("http") {
            return Ok(Self::Url(source.to_string()));
        }
        if Path::new(source).is_absolute() {
            return Ok(Self::File(PathBuf::from(source)));
        }
        Ok(Self::Resource(source.to_string()))
    }

    /// Local path for sources that can be read from disk.
    pub fn local_path(&self) -> Result<Option<PathBuf>, SourceError> {
        match self {
            Self::File(path) => Ok(Some(path.clone())),
            Self::Url(_) => Ok(None),
            Self::Resource(name) => resolve_resource(name).map(Some),
        }
    }
}

/// Finds a bundled resource by searching:
/// 1) <exe_dir>/assets/media/
/// 2) ./assets/media/  (dev working dir)
///
/// `name` may omit its extension.
pub fn resolve_resource(name: &str) -> Result<PathBuf, SourceError> {
    let mut dirs = Vec::new();
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            dirs.push(dir.join("assets").join("media"));
        }
    }
    dirs.push(PathBuf::from("assets").join("media"));

    dirs.iter()
        .find_map(|dir| find_in_dir(dir, name))
        .ok_or_else(|| SourceError::ResourceNotFound(name.to_string()))
}

fn find_in_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    let exact = dir.join(name);
    if exact.is_file() {
        return Some(exact);
    }

    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|path| path.is_file() && path.file_stem().and_then(|s| s.to_str()) == Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_sources() {
        assert_eq!(
            MediaSource::parse("file:///sdcard/movie.mp4").unwrap(),
            MediaSource::File(PathBuf::from("/sdcard/movie.mp4"))
        );
        assert_eq!(
            MediaSource::parse("https://example.com/v.mp4").unwrap(),
            MediaSource::Url("https://example.com/v.mp4".into())
        );
        assert_eq!(
            MediaSource::parse("congo").unwrap(),
            MediaSource::Resource("congo".into())
        );
        assert_eq!(
            MediaSource::parse("filename.mp4").unwrap(),
            MediaSource::File(PathBuf::from("filename.mp4"))
        );
        assert_eq!(
            MediaSource::parse("httpclip").unwrap(),
            MediaSource::Url("httpclip".into())
        );
        assert_eq!(MediaSource::parse("  "), Err(SourceError::Empty));
    }

    #[cfg(unix)]
    #[test]
    fn absolute_path_is_a_file() {
        assert_eq!(
            MediaSource::parse("/tmp/pano.jpg").unwrap(),
            MediaSource::File(PathBuf::from("/tmp/pano.jpg"))
        );
    }

    #[test]
    fn urls_have_no_local_path() {
        let source = MediaSource::parse("http://host/clip").unwrap();
        assert_eq!(source.local_path().unwrap(), None);
    }

    #[test]
    fn missing_resource_is_reported() {
        let source = MediaSource::parse("definitely-not-bundled-7f3a").unwrap();
        assert_eq!(
            source.local_path(),
            Err(SourceError::ResourceNotFound("definitely-not-bundled-7f3a".into()))
        );
    }

    #[test]
    fn finds_resource_without_extension() {
        let dir = std::env::temp_dir().join(format!("video360-media-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("lobby.jpg"), b"jpeg").unwrap();

        assert_eq!(find_in_dir(&dir, "lobby"), Some(dir.join("lobby.jpg")));
        assert_eq!(find_in_dir(&dir, "lobby.jpg"), Some(dir.join("lobby.jpg")));
        assert_eq!(find_in_dir(&dir, "atrium"), None);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
