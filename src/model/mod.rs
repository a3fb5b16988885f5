//! Core data model types for omnistore

mod handle;
mod object;

pub use handle::BackendHandle;
pub use object::Object;
