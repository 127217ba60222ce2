use std::{io::SeekFrom, net::SocketAddr, sync::Arc};

use camino::Utf8Path;
use futures::{
    future::{self, BoxFuture},
    prelude::*,
    stream::AbortRegistration,
    stream::Abortable,
};
use snapcopy::{Chunk, DirEntry, Error, FileService, Listing, Token, MAX_CHUNK_LEN};
use tarpc::{
    context::Context,
    server::{self, Channel},
    tokio_serde::formats::Bincode,
};
use tokio::{
    io::{AsyncReadExt, AsyncSeekExt},
    net::ToSocketAddrs,
};

use crate::registry::SessionRegistry;

/// Maximum number of client channels served at once.
pub const MAX_CHANNELS: usize = 64;

/// Read side of published sessions.
///
/// Requests share nothing but the registry: every chunk read opens, seeks,
/// reads and closes the file on its own.
#[derive(Debug, Clone)]
pub struct FileServer {
    registry: Arc<SessionRegistry>,
}

impl FileServer {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub async fn list(&self, token: Token, path: &str) -> snapcopy::Result<Listing> {
        let root = self.registry.root(token)?;
        let fs_path = self.registry.resolve_contained(token, path).await?;
        log::trace!("listing {fs_path}");

        let metadata = tokio::fs::metadata(&fs_path)
            .await
            .map_err(|err| Error::from_io(err, path))?;
        if metadata.is_file() {
            let name = fs_path.file_name().unwrap_or_default();
            return Ok(Listing::File(DirEntry::file(name, metadata.len())));
        }
        if !metadata.is_dir() {
            snapcopy::other_bail!("{path} is neither a regular file nor a directory");
        }

        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&fs_path)
            .await
            .map_err(|err| Error::from_io(err, path))?;
        while let Some(direntry) = read_dir
            .next_entry()
            .await
            .map_err(|err| Error::from_io(err, path))?
        {
            let Ok(name) = direntry.file_name().into_string() else {
                log::warn!("skipping non UTF-8 entry in {fs_path}: {:?}", direntry.file_name());
                continue;
            };
            if let Some(entry) = map_direntry(&root, &fs_path, name).await? {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Listing::Directory(entries))
    }

    pub async fn get_chunk(
        &self,
        token: Token,
        path: &str,
        offset: u64,
        length: u32,
    ) -> snapcopy::Result<Chunk> {
        let fs_path = self.registry.resolve_contained(token, path).await?;
        let length = length.min(MAX_CHUNK_LEN);

        let mut file = tokio::fs::File::open(&fs_path)
            .await
            .map_err(|err| Error::from_io(err, path))?;
        let metadata = file.metadata().await?;
        if metadata.is_dir() {
            snapcopy::other_bail!("{path} is a directory");
        }
        let size = metadata.len();
        if offset >= size || length == 0 {
            return Ok(Chunk {
                data: Vec::new(),
                eof: offset >= size,
            });
        }

        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|err| Error::from_io(err, path))?;
        let mut data = Vec::with_capacity(length as usize);
        (&mut file)
            .take(u64::from(length))
            .read_to_end(&mut data)
            .await
            .map_err(|err| Error::from_io(err, path))?;

        // a short read means the file ended early, even if it shrank meanwhile
        let eof = data.len() < length as usize || offset + data.len() as u64 >= size;
        Ok(Chunk { data, eof })
    }
}

/// Map a directory entry, skipping what can't be copied.
async fn map_direntry(
    root: &Utf8Path,
    dir: &Utf8Path,
    name: String,
) -> snapcopy::Result<Option<DirEntry>> {
    let fs_path = dir.join(&name);
    let link_md = match tokio::fs::symlink_metadata(&fs_path).await {
        Ok(md) => md,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(Error::from_io(err, fs_path)),
    };
    if link_md.is_symlink() {
        match tokio::fs::canonicalize(&fs_path).await {
            Ok(target) if target.starts_with(root) => (),
            _ => {
                log::debug!("skipping symlink {fs_path} pointing out of the session");
                return Ok(None);
            }
        }
    }
    let metadata = match tokio::fs::metadata(&fs_path).await {
        Ok(md) => md,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("{fs_path} vanished while listing");
            return Ok(None);
        }
        Err(err) => return Err(Error::from_io(err, fs_path)),
    };
    if metadata.is_dir() {
        Ok(Some(DirEntry::dir(name)))
    } else if metadata.is_file() {
        Ok(Some(DirEntry::file(name, metadata.len())))
    } else {
        log::debug!("skipping special file {fs_path}");
        Ok(None)
    }
}

async fn spawn(fut: impl Future<Output = ()> + Send + 'static) {
    tokio::spawn(fut);
}

#[derive(Clone, Debug)]
pub struct RpcService {
    inner: FileServer,
}

impl RpcService {
    pub fn new(server: FileServer) -> Self {
        Self { inner: server }
    }

    /// Bind a listener on `addr`.
    ///
    /// Returns the bound address and the future serving the connections.
    pub async fn bind<A: ToSocketAddrs>(
        &self,
        addr: A,
    ) -> anyhow::Result<(SocketAddr, BoxFuture<'static, ()>)> {
        let mut listener = tarpc::serde_transport::tcp::listen(addr, Bincode::default).await?;
        let local_addr = listener.local_addr();
        log::info!("Listening on {local_addr}");

        listener.config_mut().max_frame_length(usize::MAX);
        let service = self.clone();
        let fut = listener
            // Ignore accept errors.
            .filter_map(|r| future::ready(r.ok()))
            .map(server::BaseChannel::with_defaults)
            .map(move |channel| channel.execute(service.clone().serve()).for_each(spawn))
            .buffer_unordered(MAX_CHANNELS)
            .for_each(|_| async {});
        Ok((local_addr, fut.boxed()))
    }

    /// Serve on `addr` until `abort_reg` is triggered.
    pub async fn start<A: ToSocketAddrs>(
        &self,
        addr: A,
        abort_reg: AbortRegistration,
        ready: impl FnOnce(SocketAddr) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        let (local_addr, fut) = self.bind(addr).await?;
        ready(local_addr)?;
        let _ = Abortable::new(fut, abort_reg).await;
        log::info!("Stopped listening on {local_addr}");
        Ok(())
    }
}

impl FileService for RpcService {
    async fn list(self, _: Context, token: Token, path: String) -> snapcopy::Result<Listing> {
        let res = self.inner.list(token, &path).await;
        log::trace!(target: "RPC", "FileService::list({token}, {path:?}) -> {res:?}");
        res
    }

    async fn get_chunk(
        self,
        _: Context,
        token: Token,
        path: String,
        offset: u64,
        length: u32,
    ) -> snapcopy::Result<Chunk> {
        let res = self.inner.get_chunk(token, &path, offset, length).await;
        log::trace!(
            target: "RPC",
            "FileService::get_chunk({token}, {path:?}, {offset}, {length}) -> {:?}",
            res.as_ref().map(|c| (c.data.len(), c.eof))
        );
        res
    }
}
