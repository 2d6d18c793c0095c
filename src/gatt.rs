//! Generic Attribute Profile procedures shared by client and server profiles
//! ([Vol 3] Part G).
//!
//! Client profiles describe the peer service they expect with a static
//! [`SvcTemplate`] and let [`Discovery`] locate it. Server profiles deliver
//! characteristic value events to their subscribers through [`FanOut`].

pub use {consts::*, content::*, discovery::*, event::*, fanout::*, template::*};

mod consts;
mod content;
mod discovery;
mod event;
mod fanout;
mod template;

/// Error returned when a peer service does not satisfy a client profile
/// template.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    #[error("service not found")]
    ServiceMissing,
    #[error("more than one matching service found")]
    MultipleServicesFound,
    #[error("mandatory characteristic missing")]
    CharacteristicMissing,
    #[error("mandatory descriptor missing")]
    DescriptorMissing,
    #[error("characteristic properties do not match")]
    PropertyMismatch,
}

/// Error returned synchronously in response to an application or peer
/// request.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum RequestError {
    #[error("request not allowed in the current state")]
    Disallowed,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("attribute does not exist")]
    InexistentHandle,
    #[error("feature not supported")]
    FeatureNotSupported,
}
