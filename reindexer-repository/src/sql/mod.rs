//! SQL implementation of the content store.

mod store;

pub use store::SqlContentStore;
