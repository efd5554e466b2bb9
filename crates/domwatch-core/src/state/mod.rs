// # State Store Implementations
//
// This module provides implementations of the store traits for
// different persistence strategies.

pub mod file;
pub mod memory;
mod tables;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;
