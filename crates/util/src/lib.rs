//! Shared utilities for the shale harness.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod port_allocator;

pub use port_allocator::{PortAllocator, PortError};
