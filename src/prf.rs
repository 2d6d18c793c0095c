//! Profile tasks.
//!
//! Client profiles are instances of [`Client`] parameterized by a
//! [`ClientProfile`] that supplies the expected service template. Server
//! profiles are instances of [`Server`] parameterized by a [`ServerProfile`]
//! that owns the local attribute values.

pub use {client::*, env::*, server::*};

use crate::att::ErrorCode;
use crate::gatt::{DiscoveryError, RequestError};

pub mod bas;
mod client;
mod env;
pub mod hrp;
mod server;

/// Error type returned by profile tasks.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("ATT error: {0}")]
    Att(#[from] ErrorCode),
    #[error("procedure timeout")]
    Timeout,
}

impl Error {
    /// Returns the ATT error code reported to a peer for this error.
    #[must_use]
    pub const fn att_code(&self) -> ErrorCode {
        match *self {
            Self::Request(RequestError::Disallowed) => ErrorCode::ProcedureAlreadyInProgress,
            Self::Request(RequestError::InvalidParameter) => ErrorCode::ValueNotAllowed,
            Self::Request(RequestError::InexistentHandle) => ErrorCode::InvalidHandle,
            Self::Request(RequestError::FeatureNotSupported) => ErrorCode::RequestNotSupported,
            Self::Att(code) => code,
            Self::Discovery(_) | Self::Timeout => ErrorCode::UnlikelyError,
        }
    }
}

/// Common profile result type.
pub type Result<T> = std::result::Result<T, Error>;
