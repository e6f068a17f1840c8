//! File-backed allow-list and the login interceptor that enforces it.

pub mod error;
pub mod interceptor;
pub mod store;

pub use error::AllowListError;
pub use interceptor::AllowListLoginInterceptor;
pub use store::{AllowList, AllowListEntry, AllowListFile};
