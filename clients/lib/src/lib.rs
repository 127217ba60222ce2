//! Client side of snapcopy: pulls a published tree into a local path.

mod copier;
mod dest;
mod sparse;
mod summary;

pub use crate::copier::RemotePathCopier;
pub use crate::sparse::{SparseStats, SparseWriter};
pub use crate::summary::CopySummary;

pub use tokio_util::sync::CancellationToken;
