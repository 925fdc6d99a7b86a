//! Chip images as files in one directory

use pattern_codec::{CodecError, RomStore};
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// [`RomStore`] backed by `<root>/<part file>`
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn store_error(part: &str, source: io::Error) -> CodecError {
    CodecError::Store {
        part: part.into(),
        source,
    }
}

impl RomStore for DirStore {
    fn load(&self, name: &str, offset: usize, length: usize) -> pattern_codec::Result<Vec<u8>> {
        let path = self.root.join(name);
        let bytes = std::fs::read(&path).map_err(|e| store_error(name, e))?;
        match bytes.get(offset..offset + length) {
            Some(window) => Ok(window.to_vec()),
            None => Err(store_error(
                name,
                io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("{:?} is {} bytes, need {} at {}", path, bytes.len(), length, offset),
                ),
            )),
        }
    }

    fn save(&mut self, name: &str, bytes: &[u8]) -> pattern_codec::Result<()> {
        self.save_all(&[(name, bytes)])
    }

    /// Stage every part as `<file>.tmp`, then rename them into place
    ///
    /// Nothing is renamed until every part has been written and synced; on
    /// failure the staged files are removed and existing parts are left as
    /// they were.
    fn save_all(&mut self, parts: &[(&str, &[u8])]) -> pattern_codec::Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| store_error(parts_label(parts), e))?;
        for (name, _) in parts {
            if self.root.join(name).is_dir() {
                return Err(store_error(
                    name,
                    io::Error::new(ErrorKind::InvalidInput, "destination is a directory"),
                ));
            }
        }

        let mut staged = Vec::with_capacity(parts.len());
        for (name, bytes) in parts {
            let tmp_path = self.tmp_path(name);
            // record before writing so a half-written file is cleaned up too
            staged.push((*name, tmp_path.clone()));
            if let Err(e) = write_synced(&tmp_path, bytes) {
                discard(&staged);
                return Err(store_error(name, e));
            }
        }

        for (name, tmp_path) in &staged {
            let path = self.root.join(name);
            #[cfg(windows)]
            {
                if path.exists() {
                    // Windows rename fails if destination exists.
                    if let Err(e) = std::fs::remove_file(&path) {
                        discard(&staged);
                        return Err(store_error(name, e));
                    }
                }
            }
            if let Err(e) = std::fs::rename(tmp_path, &path) {
                discard(&staged);
                return Err(store_error(name, e));
            }
        }

        tracing::debug!("Wrote {} part(s) to {:?}", parts.len(), self.root);
        Ok(())
    }
}

impl DirStore {
    fn tmp_path(&self, name: &str) -> PathBuf {
        let mut tmp_name = OsString::from(name);
        tmp_name.push(".tmp");
        self.root.join(tmp_name)
    }
}

fn parts_label<'a>(parts: &[(&'a str, &[u8])]) -> &'a str {
    parts.first().map(|(name, _)| *name).unwrap_or("")
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut f = File::create(path)?;
    f.write_all(bytes)?;
    f.sync_all()
}

/// Remove staged files that are still around
fn discard(staged: &[(&str, PathBuf)]) {
    for (_, tmp_path) in staged {
        if tmp_path.exists() {
            let _ = std::fs::remove_file(tmp_path);
        }
    }
}
