pub mod change_set;
pub mod library_store;

pub use change_set::*;
pub use library_store::LibraryStore;
