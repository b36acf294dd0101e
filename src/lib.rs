pub mod bench;
pub mod comm;
pub mod config;
pub mod error;
pub mod mem;
pub mod topo;

pub use error::{BenchError, Result};

#[cfg(test)]
mod test;
