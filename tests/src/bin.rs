#![cfg(test)]

use std::sync::{Arc, Once};

use camino::Utf8PathBuf;
use snapcopy::Token;
use snapcopyd::{FileServer, RpcService, SessionRegistry};

mod dataset;
mod faults;
mod harness;
mod tests;
mod utils;

use dataset::Entry;
use faults::{Fault, FaultyService};
use harness::Harness;

static LOG_INIT: Once = Once::new();

/// Fill a fresh directory with `dataset` and publish it, next to an empty
/// destination directory.
async fn publish(dataset: &[Entry]) -> (Arc<SessionRegistry>, Token, Utf8PathBuf, Utf8PathBuf) {
    LOG_INIT.call_once(env_logger::init);

    let root = utils::temp_path(Some("snapcopy-src"), None);
    tokio::fs::create_dir(&root).await.unwrap();
    dataset::create(&root, dataset).await.unwrap();

    let dest = utils::temp_path(Some("snapcopy-dst"), None);
    tokio::fs::create_dir(&dest).await.unwrap();

    let registry = Arc::new(SessionRegistry::new());
    let token = registry.publish(&root).unwrap();
    (registry, token, root, dest)
}

/// Start a server on a random port, publishing a fresh directory filled
/// with `dataset`.
async fn harness(dataset: &[Entry]) -> Harness {
    let (registry, token, root, dest) = publish(dataset).await;

    let rpc = RpcService::new(FileServer::new(registry.clone()));
    let (addr, serve) = rpc.bind("127.0.0.1:0").await.unwrap();
    let server = tokio::spawn(serve);

    Harness {
        registry,
        endpoint: addr.into(),
        token,
        root,
        dest,
        server,
    }
}

/// Same as [`harness`], with chunks served according to `fault`.
async fn faulty_harness(dataset: &[Entry], fault: Fault) -> (Harness, FaultyService) {
    let (registry, token, root, dest) = publish(dataset).await;

    let service = FaultyService::new(FileServer::new(registry.clone()), fault);
    let (addr, serve) = service.clone().bind().await;
    let server = tokio::spawn(serve);

    let harness = Harness {
        registry,
        endpoint: addr.into(),
        token,
        root,
        dest,
        server,
    };
    (harness, service)
}
