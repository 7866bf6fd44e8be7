//! CLI command implementations.

pub(crate) mod replay;
pub(crate) mod serve;
pub(crate) mod tail;
