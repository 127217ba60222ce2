use std::process::ExitCode;

use systemd_journal_logger::{connected_to_journal, JournalLog};
use tokio::task::JoinHandle;

use crate::ShutdownRef;

fn init_logging() {
    if connected_to_journal() {
        if let Ok(journal) = JournalLog::new() {
            let installed = journal
                .add_extra_field("VERSION", env!("CARGO_PKG_VERSION"))
                .install();
            if installed.is_ok() {
                log::set_max_level(log::LevelFilter::Info);
                return;
            }
        }
    }
    env_logger::init();
}

pub fn main() -> ExitCode {
    init_logging();

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
        let signals = match handle_shutdown_signals(shutdown_ref.clone()) {
            Ok(signals) => signals,
            Err(err) => return crate::exit_program(Err(err.into())),
        };
        let res = crate::run(std::env::args_os().collect(), shutdown_ref).await;
        signals.abort();
        crate::exit_program(res)
    })
}

fn handle_shutdown_signals(shutdown_ref: ShutdownRef) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sig_term = signal(SignalKind::terminate())?;
    let mut sig_int = signal(SignalKind::interrupt())?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = sig_term.recv() => {
                log::warn!("received SIGTERM");
            }
            _ = sig_int.recv() => {
                log::warn!("received SIGINT");
            }
        };
        shutdown_ref.shutdown().await;
    }))
}
