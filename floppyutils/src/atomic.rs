use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Remplace le contenu de `path` de manière atomique.
///
/// The bytes are written to a temporary file created in the same directory,
/// flushed to disk, then renamed over `path`. A reader sees either the old
/// content or the new one, never a truncated file.
///
/// The parent directory must exist.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
