//! Local destination handling.
//!
//! Every error raised here is about the destination: permission failures
//! are reported as [`Error::DestinationUnwritable`].
use std::collections::HashSet;

use camino::{Utf8Path, Utf8PathBuf};
use rand::{distributions::Alphanumeric, Rng};
use snapcopy::Error;
use tokio::fs;

const STAGING_MARK: &str = ".snapcopy-";

/// A temporary sibling of a destination file.
///
/// The temporary is deleted on drop unless it was committed, which covers
/// errors as well as a cancelled transfer.
#[derive(Debug)]
pub(crate) struct StagedFile {
    path: Utf8PathBuf,
    target: Utf8PathBuf,
    committed: bool,
}

impl StagedFile {
    pub async fn create(target: &Utf8Path) -> snapcopy::Result<(Self, fs::File)> {
        let (Some(parent), Some(name)) = (target.parent(), target.file_name()) else {
            return Err(Error::InvalidPath(target.to_string()));
        };
        let rnd: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        let path = parent.join(format!(".{name}{STAGING_MARK}{rnd}"));
        log::trace!("staging {target} in {path}");
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|err| Error::from_dest_io(err, &path))?;
        let staged = Self {
            path,
            target: target.to_owned(),
            committed: false,
        };
        Ok((staged, file))
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Move the temporary to its final name.
    pub async fn commit(mut self) -> snapcopy::Result<()> {
        fs::rename(&self.path, &self.target)
            .await
            .map_err(|err| Error::from_dest_io(err, &self.target))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        log::debug!("removing unfinished {}", self.path);
        // drop can't await, a single blocking unlink is acceptable here
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                log::warn!("could not remove {}: {err}", self.path);
            }
        }
    }
}

/// Remove whatever exists at `path`.
pub(crate) async fn remove_entry(path: &Utf8Path) -> snapcopy::Result<()> {
    let metadata = fs::symlink_metadata(path)
        .await
        .map_err(|err| Error::from_dest_io(err, path))?;
    log::info!("removing {path}");
    let res = if metadata.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    res.map_err(|err| unwritable(err, path))
}

/// Make sure a directory exists at `path`, replacing a non-directory.
///
/// Returns whether the directory was created.
pub(crate) async fn ensure_dir(path: &Utf8Path) -> snapcopy::Result<bool> {
    match fs::symlink_metadata(path).await {
        Ok(md) if md.is_dir() => return Ok(false),
        Ok(..) => remove_entry(path).await?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => (),
        Err(err) => return Err(Error::from_dest_io(err, path)),
    }
    log::debug!("mkdir {path}");
    fs::create_dir(path)
        .await
        .map_err(|err| unwritable(err, path))?;
    Ok(true)
}

/// Make sure nothing but a regular file or nothing exists at `path`.
pub(crate) async fn clear_for_file(path: &Utf8Path) -> snapcopy::Result<()> {
    match fs::symlink_metadata(path).await {
        Ok(md) if md.is_dir() => remove_entry(path).await,
        _ => Ok(()),
    }
}

/// Remove the entries of `dir` whose name is not in `keep`.
///
/// Returns the number of removed entries.
pub(crate) async fn prune(dir: &Utf8Path, keep: &HashSet<String>) -> snapcopy::Result<usize> {
    let mut read_dir = fs::read_dir(dir)
        .await
        .map_err(|err| unwritable(err, dir))?;
    let mut stale = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|err| unwritable(err, dir))?
    {
        match entry.file_name().into_string() {
            Ok(name) if keep.contains(&name) => (),
            Ok(name) => stale.push(dir.join(name)),
            Err(name) => {
                return Err(Error::DestinationUnwritable(format!(
                    "{dir}: cannot handle non UTF-8 entry {name:?}"
                )))
            }
        }
    }
    for path in &stale {
        remove_entry(path).await?;
    }
    Ok(stale.len())
}

fn unwritable(err: std::io::Error, path: &Utf8Path) -> Error {
    Error::DestinationUnwritable(format!("{path}: {err}"))
}
