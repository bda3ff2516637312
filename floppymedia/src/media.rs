use std::path::{Component, Path, PathBuf};

use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::error::{MediaError, Result};

/// An opened media file, ready to be streamed to the speaker.
#[derive(Debug)]
pub struct MediaStream {
    pub content_type: &'static str,
    pub length: u64,
    pub body: ReaderStream<File>,
}

/// Serves the files of one directory over HTTP.
#[derive(Debug, Clone)]
pub struct LocalMediaServer {
    root: PathBuf,
    host: String,
    port: u16,
}

impl LocalMediaServer {
    /// Creates a server for `root`.
    ///
    /// The root is canonicalized once so that every later containment check
    /// compares against the real directory. Fails when the root does not
    /// exist or cannot be listed.
    pub fn new(root: impl AsRef<Path>, host: impl Into<String>, port: u16) -> Result<Self> {
        let root = root.as_ref();
        let unavailable = |source| MediaError::RootUnavailable {
            path: root.to_path_buf(),
            source,
        };

        let canonical = root.canonicalize().map_err(unavailable)?;
        std::fs::read_dir(&canonical).map_err(unavailable)?;

        Ok(Self {
            root: canonical,
            host: host.into(),
            port,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL under which the speaker can fetch `filename`.
    ///
    /// Each path segment is percent-encoded; the file does not need to exist.
    pub fn build_uri(&self, filename: &str) -> String {
        let path = filename
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("http://{}:{}/{}", self.host, self.port, path)
    }

    /// Maps `filename` to a regular file inside the root.
    ///
    /// Anything but plain path segments (`..`, `/`, prefixes) is refused
    /// before touching the filesystem, then the canonical target must still
    /// live under the root, which also catches escaping symlinks.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        let relative = Path::new(filename);

        if filename.is_empty() {
            return Err(MediaError::FileNotFound(filename.to_string()));
        }
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            warn!(filename, "Rejected media path outside of the root");
            return Err(MediaError::PathTraversal(filename.to_string()));
        }

        let canonical = match self.root.join(relative).canonicalize() {
            Ok(path) => path,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::FileNotFound(filename.to_string()));
            }
            Err(e) => return Err(MediaError::Io(e)),
        };

        if !canonical.starts_with(&self.root) {
            warn!(filename, target = %canonical.display(), "Media link escapes the root");
            return Err(MediaError::PathTraversal(filename.to_string()));
        }
        if !canonical.is_file() {
            return Err(MediaError::FileNotFound(filename.to_string()));
        }

        Ok(canonical)
    }

    /// Opens `filename` as a byte stream.
    pub async fn serve(&self, filename: &str) -> Result<MediaStream> {
        let path = self.resolve(filename)?;
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::FileNotFound(filename.to_string()));
            }
            Err(e) => return Err(MediaError::Io(e)),
        };
        let length = file.metadata().await?.len();

        debug!(filename, length, "Serving media file");
        Ok(MediaStream {
            content_type: content_type_for(&path),
            length,
            body: ReaderStream::new(file),
        })
    }
}

/// MIME type announced for a media file, from its extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("m4a") | Some("aac") | Some("mp4") => "audio/mp4",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}
