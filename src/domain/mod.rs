pub mod book;
pub mod category;
pub mod commands;
pub mod errors;
pub mod loan;
pub mod member;
pub mod value_objects;

pub use book::*;
pub use category::*;
pub use errors::*;
pub use loan::*;
pub use member::*;
pub use value_objects::*;
