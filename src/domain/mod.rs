//! Domain types and the ports the application layer depends on.

pub mod account;
pub mod charge;
pub mod limits;
pub mod notice;
pub mod ports;
pub mod query;
pub mod session;
