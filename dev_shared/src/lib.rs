//! Helpers shared by the tests of the PIE workspace.

pub mod fs;
pub mod task;
pub mod test;
