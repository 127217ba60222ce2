use std::collections::{HashSet, VecDeque};

use camino::{Utf8Path, Utf8PathBuf};
use futures::{future, stream, Future, StreamExt, TryStreamExt};
use snapcopy::{
    path, Chunk, CopyOptions, DirEntry, Endpoint, Error, FileServiceClient, Listing, Token,
};
use tokio_util::sync::CancellationToken;

use crate::{
    dest::{self, StagedFile},
    sparse::SparseWriter,
    CopySummary,
};

/// Pulls files and directory trees out of a remote session.
///
/// The RPC channel is opened once by [`RemotePathCopier::init`] and shared by
/// every copy, including concurrent ones.
#[derive(Clone)]
pub struct RemotePathCopier {
    client: FileServiceClient,
    endpoint: Endpoint,
    token: Token,
}

#[derive(Debug)]
struct PlannedDir {
    dest: Utf8PathBuf,
    keep: HashSet<String>,
}

#[derive(Debug)]
struct PlannedFile {
    source: String,
    dest: Utf8PathBuf,
    size: u64,
}

/// The whole remote tree, directories in pre-order.
#[derive(Debug, Default)]
struct Plan {
    dirs: Vec<PlannedDir>,
    files: Vec<PlannedFile>,
}

impl RemotePathCopier {
    pub async fn init(endpoint: &Endpoint, token: Token) -> snapcopy::Result<Self> {
        let addr = endpoint.resolve().await?;
        log::debug!("connecting to {endpoint} ({addr})");
        let client = snapcopy::connect(addr)
            .await
            .map_err(|err| Error::Rpc(format!("cannot connect to {endpoint}: {err}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.clone(),
            token,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn token(&self) -> Token {
        self.token
    }

    /// List a remote path, with the retry policy of `options`.
    pub async fn list(&self, source: &str, options: &CopyOptions) -> snapcopy::Result<Listing> {
        match retry(options, || self.request_list(source, options)).await {
            Ok(listing) => Ok(listing),
            Err(Failure::Fatal(err)) => Err(source_error(err)),
            Err(Failure::Exhausted { last, .. }) => Err(last),
        }
    }

    /// Copy `source` from the session into `dest`.
    ///
    /// A file copied onto an existing directory lands inside of it under its
    /// own name. A directory replaces the content of `dest`.
    pub async fn copy<P: AsRef<Utf8Path>>(
        &self,
        source: &str,
        dest: P,
        options: Option<&CopyOptions>,
    ) -> snapcopy::Result<CopySummary> {
        self.copy_with_cancel(source, dest, options, &CancellationToken::new())
            .await
    }

    /// Same as [`Self::copy`], stopping with [`Error::Cancelled`] as soon as
    /// `cancel` fires.
    pub async fn copy_with_cancel<P: AsRef<Utf8Path>>(
        &self,
        source: &str,
        dest: P,
        options: Option<&CopyOptions>,
        cancel: &CancellationToken,
    ) -> snapcopy::Result<CopySummary> {
        let default_options;
        let options = match options {
            Some(options) => options,
            None => {
                default_options = CopyOptions::default();
                &default_options
            }
        };
        options.validate()?;

        let dest = dest.as_ref();
        log::info!(
            "copying {source} from {} (session {}) to {dest}",
            self.endpoint,
            self.token
        );
        // dropping the transfers removes their staged files
        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            res = self.do_copy(source, dest, options) => res,
        };
        match &res {
            Ok(summary) => log::info!("copied {source} to {dest}: {summary:?}"),
            Err(err) => log::error!("copy of {source} to {dest} failed: {err}"),
        }
        res
    }

    async fn do_copy(
        &self,
        source: &str,
        dest: &Utf8Path,
        options: &CopyOptions,
    ) -> snapcopy::Result<CopySummary> {
        match self.list(source, options).await? {
            Listing::File(entry) => {
                path::check_name(&entry.name)?;
                let target = match tokio::fs::metadata(dest).await {
                    Ok(md) if md.is_dir() => dest.join(&entry.name),
                    _ => dest.to_owned(),
                };
                self.pull_file(source, &target, entry.size, options).await
            }
            Listing::Directory(entries) => {
                let plan = self.plan(source, dest, entries, options).await?;
                log::debug!(
                    "{source}: {} directories, {} files",
                    plan.dirs.len(),
                    plan.files.len()
                );
                self.execute(plan, options).await
            }
        }
    }

    async fn plan(
        &self,
        source: &str,
        dest: &Utf8Path,
        entries: Vec<DirEntry>,
        options: &CopyOptions,
    ) -> snapcopy::Result<Plan> {
        let mut plan = Plan::default();
        let mut queue = VecDeque::from([(source.to_string(), dest.to_owned(), entries)]);

        while let Some((source, dest, entries)) = queue.pop_front() {
            let mut keep = HashSet::with_capacity(entries.len());
            for entry in entries {
                path::check_name(&entry.name)?;
                let child_source = path::join(&source, &entry.name);
                let child_dest = dest.join(&entry.name);
                if entry.is_directory {
                    let Listing::Directory(entries) = self.list(&child_source, options).await?
                    else {
                        return Err(Error::SourceNotFound(format!(
                            "{child_source} is no longer a directory"
                        )));
                    };
                    queue.push_back((child_source, child_dest, entries));
                } else {
                    plan.files.push(PlannedFile {
                        source: child_source,
                        dest: child_dest,
                        size: entry.size,
                    });
                }
                keep.insert(entry.name);
            }
            plan.dirs.push(PlannedDir { dest, keep });
        }
        Ok(plan)
    }

    async fn execute(&self, plan: Plan, options: &CopyOptions) -> snapcopy::Result<CopySummary> {
        let mut summary = CopySummary::default();
        for dir in &plan.dirs {
            if dest::ensure_dir(&dir.dest).await? {
                summary.directories_created += 1;
            }
            summary.entries_removed += dest::prune(&dir.dest, &dir.keep).await?;
        }

        // the first error drops the stream, and with it every transfer in flight
        stream::iter(plan.files)
            .map(|file| async move {
                self.pull_file(&file.source, &file.dest, file.size, options)
                    .await
            })
            .buffer_unordered(options.max_concurrent_file_transfers)
            .try_fold(summary, |acc, file| future::ready(Ok(acc + file)))
            .await
    }

    async fn pull_file(
        &self,
        source: &str,
        target: &Utf8Path,
        size: u64,
        options: &CopyOptions,
    ) -> snapcopy::Result<CopySummary> {
        dest::clear_for_file(target).await?;
        let (staged, file) = StagedFile::create(target).await?;
        log::debug!("pulling {source} ({size} bytes) into {}", staged.path());

        let local_err = |err| Error::from_dest_io(err, staged.path());
        let mut writer = SparseWriter::new(file, options.sparse_threshold);
        let mut offset = 0;
        loop {
            let chunk = self.fetch_chunk(source, offset, options).await?;
            writer.write_chunk(&chunk.data).await.map_err(local_err)?;
            offset += chunk.data.len() as u64;
            if chunk.eof {
                break;
            }
            if chunk.data.is_empty() {
                return Err(Error::ChunkTransferFailed {
                    path: source.to_string(),
                    offset,
                    attempts: 1,
                    reason: "empty chunk before end of file".into(),
                });
            }
        }
        let (file, stats) = writer.finish().await.map_err(local_err)?;
        file.sync_all().await.map_err(local_err)?;
        drop(file);

        if stats.len != size {
            log::warn!("{source} was listed with {size} bytes, {} received", stats.len);
        }
        staged.commit().await?;
        log::debug!(
            "{target}: {} bytes, {} written, {} in holes",
            stats.len,
            stats.written,
            stats.holes
        );
        Ok(CopySummary {
            files_copied: 1,
            bytes_copied: stats.len,
            bytes_skipped_as_holes: stats.holes,
            ..Default::default()
        })
    }

    async fn fetch_chunk(
        &self,
        source: &str,
        offset: u64,
        options: &CopyOptions,
    ) -> snapcopy::Result<Chunk> {
        match retry(options, || self.request_chunk(source, offset, options)).await {
            Ok(chunk) => Ok(chunk),
            Err(Failure::Fatal(err)) => Err(source_error(err)),
            Err(Failure::Exhausted { attempts, last }) => Err(Error::ChunkTransferFailed {
                path: source.to_string(),
                offset,
                attempts,
                reason: last.to_string(),
            }),
        }
    }

    async fn request_list(&self, source: &str, options: &CopyOptions) -> snapcopy::Result<Listing> {
        let call = self
            .client
            .list(request_ctx(options), self.token, source.to_string());
        match tokio::time::timeout(options.request_timeout, call).await {
            Ok(res) => res?,
            Err(..) => Err(Error::Rpc(format!(
                "list {source}: no response after {:?}",
                options.request_timeout
            ))),
        }
    }

    async fn request_chunk(
        &self,
        source: &str,
        offset: u64,
        options: &CopyOptions,
    ) -> snapcopy::Result<Chunk> {
        let call = self.client.get_chunk(
            request_ctx(options),
            self.token,
            source.to_string(),
            offset,
            options.chunk_size,
        );
        match tokio::time::timeout(options.request_timeout, call).await {
            Ok(res) => res?,
            Err(..) => Err(Error::Rpc(format!(
                "get_chunk {source}@{offset}: no response after {:?}",
                options.request_timeout
            ))),
        }
    }
}

fn request_ctx(options: &CopyOptions) -> tarpc::context::Context {
    let mut ctx = snapcopy::ctx();
    // the local timeout decides, the deadline must not expire before it
    ctx.deadline += options.request_timeout;
    ctx
}

#[derive(Debug)]
enum Failure {
    /// Not worth retrying
    Fatal(Error),
    Exhausted { attempts: u32, last: Error },
}

async fn retry<T, F, Fut>(options: &CopyOptions, mut request: F) -> Result<T, Failure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = snapcopy::Result<T>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match request().await {
            Ok(res) => return Ok(res),
            Err(err) if !err.is_retryable() => return Err(Failure::Fatal(err)),
            Err(err) if attempts > options.max_retries_per_chunk => {
                return Err(Failure::Exhausted {
                    attempts,
                    last: err,
                })
            }
            Err(err) => {
                log::warn!(
                    "attempt {attempts} failed: {err}, retrying in {:?}",
                    options.retry_interval
                );
                tokio::time::sleep(options.retry_interval).await;
            }
        }
    }
}

/// Deterministic server errors about the source.
fn source_error(err: Error) -> Error {
    match err {
        Error::NotFound(path) => Error::SourceNotFound(path),
        Error::PermissionDenied(path) => Error::SourceUnreadable(path),
        err => err,
    }
}
