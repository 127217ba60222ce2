use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use tarpc::{client, context, tokio_serde::formats::Bincode};

use crate::Token;

/// Upper bound of the bytes returned by a single `get_chunk` call.
pub const MAX_CHUNK_LEN: u32 = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub is_directory: bool,
    /// Size in bytes, zero for directories
    pub size: u64,
}

impl DirEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
            size,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
            size: 0,
        }
    }
}

/// Result of listing a session path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Listing {
    /// The path names a regular file
    File(DirEntry),
    /// The path names a directory, entries are sorted by name
    Directory(Vec<DirEntry>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub data: Vec<u8>,
    /// No byte exists past the end of `data`
    pub eof: bool,
}

#[tarpc::service]
pub trait FileService {
    /// List `path` within session `token`.
    async fn list(token: Token, path: String) -> crate::Result<Listing>;
    /// Read up to `length` bytes of the file at `path` starting at `offset`.
    async fn get_chunk(token: Token, path: String, offset: u64, length: u32) -> crate::Result<Chunk>;
}

pub fn ctx() -> context::Context {
    context::current()
}

/// Connect a client to a file service listening on `addr`.
pub async fn connect(addr: SocketAddr) -> std::io::Result<FileServiceClient> {
    let mut transport = tarpc::serde_transport::tcp::connect(addr, Bincode::default);
    transport.config_mut().max_frame_length(usize::MAX);

    Ok(FileServiceClient::new(client::Config::default(), transport.await?).spawn())
}
