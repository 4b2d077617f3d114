//! Q.921 (LAPD) data link layer

pub mod instance;
pub mod lapd_entity;
mod tei;

pub use instance::{Instance, LinkCtx, Q921State, TxFrame};
pub use lapd_entity::{Lapd, ROOT};
