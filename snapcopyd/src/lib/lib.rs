pub mod registry;
pub mod service;

pub use crate::registry::SessionRegistry;
pub use crate::service::{FileServer, RpcService};
