pub mod linked_pair;

pub use linked_pair::*;
