//! Test doubles for exercising jobwarden managers without a real domain.

mod job;
mod mock;

pub use job::*;
pub use mock::*;
