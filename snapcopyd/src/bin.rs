use std::{ffi::OsString, process::ExitCode, sync::Arc};

use camino::Utf8PathBuf;
use clap::Parser;
use futures::stream::AbortHandle;
use snapcopy::Token;
use snapcopyd::{FileServer, RpcService, SessionRegistry};
use tokio::sync::RwLock;

#[cfg(unix)]
mod posix;

#[cfg(unix)]
fn main() -> ExitCode {
    posix::main()
}

#[cfg(not(unix))]
fn main() -> ExitCode {
    env_logger::init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!("Could not start the runtime: {err}");
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(async move {
        let shutdown_ref = ShutdownRef::new();
        let ctrl_c = tokio::spawn({
            let shutdown_ref = shutdown_ref.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("received Ctrl-C");
                    shutdown_ref.shutdown().await;
                }
            }
        });
        let res = run(std::env::args_os().collect(), shutdown_ref).await;
        ctrl_c.abort();
        exit_program(res)
    })
}

#[derive(Clone)]
struct ShutdownRef {
    inner: Arc<RwLock<Option<AbortHandle>>>,
}

impl ShutdownRef {
    fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }

    async fn set(&self, inner: AbortHandle) {
        let mut write = self.inner.write().await;
        *write = Some(inner);
    }

    async fn shutdown(&self) {
        let read = self.inner.read().await;
        if let Some(inner) = &*read {
            inner.abort();
        }
    }
}

#[derive(Parser)]
#[command(name = "snapcopyd")]
#[command(author, version, about, long_about=None)]
struct Cli {
    /// JSON configuration file
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    /// Address to listen on, overrides the configuration
    #[arg(long)]
    listen: Option<String>,

    /// Token to publish ROOT under, random if omitted
    #[arg(long)]
    token: Option<Token>,

    /// File to write the listening port to
    #[arg(long)]
    port_file: Option<Utf8PathBuf>,

    /// Directory to publish
    root: Option<Utf8PathBuf>,
}

async fn run(args: Vec<OsString>, shutdown_ref: ShutdownRef) -> anyhow::Result<()> {
    let cli = Cli::parse_from(args);

    let config = match &cli.config {
        Some(config_file) => {
            log::info!("Loading config file: {config_file}");
            snapcopy::Config::load_from_file(config_file).await?
        }
        None => snapcopy::Config::default(),
    };
    log::trace!("Loaded config: {config:?}");

    let registry = Arc::new(SessionRegistry::new());
    for session in &config.sessions {
        registry.publish_with_token(session.token, &session.root)?;
    }
    if let Some(root) = &cli.root {
        let token = match cli.token {
            Some(token) => {
                registry.publish_with_token(token, root)?;
                token
            }
            None => registry.publish(root)?,
        };
        println!("session {token}: {root}");
    }
    if registry.is_empty() {
        anyhow::bail!("Nothing to publish: give a ROOT directory or configure sessions");
    }

    let listen = cli.listen.as_deref().unwrap_or(config.listen());

    let (abort_handle, abort_reg) = AbortHandle::new_pair();
    shutdown_ref.set(abort_handle).await;

    let rpc = RpcService::new(FileServer::new(registry.clone()));
    let port_file = cli.port_file.clone();
    rpc.start(listen, abort_reg, |addr| {
        println!("listening on {addr}");
        if let Some(port_file) = &port_file {
            let port_str = serde_json::to_string(&addr.port())?;
            log::trace!("Creating file {port_file}");
            std::fs::write(port_file, port_str.as_bytes())?;
        }
        Ok(())
    })
    .await?;

    for token in registry.tokens() {
        registry.unpublish(token)?;
    }
    if let Some(port_file) = &cli.port_file {
        log::trace!("Removing file {port_file}");
        tokio::fs::remove_file(port_file).await?;
    }
    Ok(())
}

pub fn exit_program(res: anyhow::Result<()>) -> ExitCode {
    match res {
        Ok(..) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("snapcopyd failed: {err:#}");
            eprintln!("snapcopyd failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}
