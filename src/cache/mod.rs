//! Identifier caching layer
//!
//! Remembers which Drive object a relative path resolved to, so repeated
//! calls skip the lookup queries.

pub mod ids;

pub use ids::PathIdCache;
