//! Live schema discovery: column metadata, primary keys, and
//! foreign-key edges resolved on demand from a connection, fronted by a
//! size-bounded cache.

pub mod cache;
pub mod probe;

pub use cache::MetadataCache;
