//! Attribute Protocol types shared by client and server profiles
//! ([Vol 3] Part F).

pub use {consts::*, handle::*};

mod consts;
mod handle;

/// Completion status of a transport procedure. `Ok(())` and
/// `Err(ErrorCode::AttributeNotFound)` are both benign for discovery rounds.
pub type Status = std::result::Result<(), ErrorCode>;
