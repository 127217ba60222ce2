//! A file service misbehaving on purpose, to reach the copier's failure paths.
#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::{
    future::{self, BoxFuture},
    prelude::*,
};
use snapcopy::{Chunk, Error, FileService, Listing, Token};
use snapcopyd::FileServer;
use tarpc::{
    context::Context,
    server::{self, Channel},
    tokio_serde::formats::Bincode,
};

#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Every chunk request fails with an IO error
    ChunkIo,
    /// Chunks come back empty without reaching the end of file
    EmptyChunk,
    /// Chunks are served after a delay
    SlowChunks(Duration),
}

/// Serves listings faithfully and chunks according to its [`Fault`].
#[derive(Clone)]
pub struct FaultyService {
    server: FileServer,
    fault: Fault,
    chunk_calls: Arc<AtomicU32>,
}

impl FaultyService {
    pub fn new(server: FileServer, fault: Fault) -> Self {
        Self {
            server,
            fault,
            chunk_calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Number of `get_chunk` requests received so far.
    pub fn chunk_calls(&self) -> u32 {
        self.chunk_calls.load(Ordering::SeqCst)
    }

    pub async fn bind(self) -> (SocketAddr, BoxFuture<'static, ()>) {
        let mut listener = tarpc::serde_transport::tcp::listen("127.0.0.1:0", Bincode::default)
            .await
            .expect("Should bind");
        let addr = listener.local_addr();
        listener.config_mut().max_frame_length(usize::MAX);
        let fut = listener
            .filter_map(|r| future::ready(r.ok()))
            .map(server::BaseChannel::with_defaults)
            .map(move |channel| {
                channel
                    .execute(self.clone().serve())
                    .for_each(|fut| async move {
                        tokio::spawn(fut);
                    })
            })
            .buffer_unordered(8)
            .for_each(|_| async {});
        (addr, fut.boxed())
    }
}

impl FileService for FaultyService {
    async fn list(self, _: Context, token: Token, path: String) -> snapcopy::Result<Listing> {
        self.server.list(token, &path).await
    }

    async fn get_chunk(
        self,
        _: Context,
        token: Token,
        path: String,
        offset: u64,
        length: u32,
    ) -> snapcopy::Result<Chunk> {
        self.chunk_calls.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            Fault::ChunkIo => Err(Error::Io(format!("{path}: input/output error at {offset}"))),
            Fault::EmptyChunk => Ok(Chunk {
                data: Vec::new(),
                eof: false,
            }),
            Fault::SlowChunks(delay) => {
                tokio::time::sleep(delay).await;
                self.server.get_chunk(token, &path, offset, length).await
            }
        }
    }
}
