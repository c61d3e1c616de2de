//! # declmap-store
//!
//! Storage for extracted definitions: an arena of [`Definition`] records
//! addressed by stable [`DefId`] indices, forming a scope tree rooted at
//! one global namespace. Parent links are ids, not references, because
//! the scope graph is cyclic by nature.
//!
//! The store is policy-free: it inserts, looks up, and dumps. What a
//! definition means is the declaration parser's business.

pub mod definition;
pub mod store;

pub use definition::{flags, DefId, Definition, TypeRef};
pub use store::{DecResult, DefStore};
