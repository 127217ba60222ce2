//! Shared types of the snapshot copy service.
//!
//! The server side lives in `snapcopyd`, the copier in `snapcopy-client`.
//! Both talk through the [`FileService`] RPC trait defined here.

pub mod error;

pub mod config;
pub mod endpoint;
pub mod options;
pub mod path;

mod ipc;

pub use crate::config::Config;
pub use crate::endpoint::Endpoint;
pub use crate::error::{Error, Result};
pub use crate::ipc::*;
pub use crate::options::CopyOptions;

/// Opaque identifier of a published session.
pub type Token = u64;
