pub mod listener;
pub mod routes;

pub use listener::{bind, serve};
