//! Template source snapshots.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// The raw text of a template plus its resource identity and the
/// last-modified timestamp observed at read time.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    pub path: PathBuf,
    pub text: String,
    pub mtime: SystemTime,
}

impl TemplateSource {
    /// Read a template file and snapshot its mtime.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mtime = std::fs::metadata(path)?.modified()?;
        Ok(Self {
            path: path.to_path_buf(),
            text,
            mtime,
        })
    }
}
