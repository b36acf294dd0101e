//! 拓扑
//!
//! Ring neighbor derivation for the process group.

pub mod ring;

pub use ring::RingTopology;
