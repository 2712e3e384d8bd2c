//! CLI command implementations

pub mod check;
pub mod load;
pub mod order;
pub mod status;
