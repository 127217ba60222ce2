#![allow(dead_code)]

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use snapcopy::{CopyOptions, Endpoint, Token};
use snapcopy_client::{CopySummary, RemotePathCopier};
use snapcopyd::SessionRegistry;
use tokio::task::JoinHandle;

pub struct Harness {
    pub registry: Arc<SessionRegistry>,
    pub endpoint: Endpoint,
    pub token: Token,
    /// Published directory
    pub root: Utf8PathBuf,
    /// Scratch directory for the copies
    pub dest: Utf8PathBuf,
    pub server: JoinHandle<()>,
}

impl Harness {
    pub async fn copier(&self) -> RemotePathCopier {
        RemotePathCopier::init(&self.endpoint, self.token)
            .await
            .expect("Should connect")
    }

    pub fn src<P: AsRef<Utf8Path>>(&self, path: P) -> Utf8PathBuf {
        self.root.join(path)
    }

    pub fn dst<P: AsRef<Utf8Path>>(&self, path: P) -> Utf8PathBuf {
        self.dest.join(path)
    }

    /// Copy `source` to `dest` relative to the scratch directory.
    pub async fn copy(
        &self,
        source: &str,
        dest: &str,
        options: Option<&CopyOptions>,
    ) -> snapcopy::Result<CopySummary> {
        self.copier().await.copy(source, self.dst(dest), options).await
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.server.abort();
        for dir in [&self.root, &self.dest] {
            if let Err(err) = std::fs::remove_dir_all(dir) {
                log::warn!("could not remove {dir}: {err}");
            }
        }
    }
}
