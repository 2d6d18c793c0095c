use std::ops::RangeBounds;

use profkit_const::Uuid;

use super::*;

/// Presence requirement of a template entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Requirement {
    Mandatory,
    Optional,
}

/// Expected characteristic of a peer service.
#[derive(Clone, Copy, Debug)]
pub struct CharTemplate {
    pub uuid: Uuid,
    pub req: Requirement,
    /// Properties that the discovered characteristic must include.
    pub props: CharProps,
}

impl CharTemplate {
    /// Creates a mandatory characteristic template.
    #[inline]
    #[must_use]
    pub const fn mandatory(uuid: Uuid, props: CharProps) -> Self {
        Self {
            uuid,
            req: Requirement::Mandatory,
            props,
        }
    }

    /// Creates an optional characteristic template.
    #[inline]
    #[must_use]
    pub const fn optional(uuid: Uuid, props: CharProps) -> Self {
        Self {
            uuid,
            req: Requirement::Optional,
            props,
        }
    }
}

/// Expected descriptor of a peer service characteristic.
#[derive(Clone, Copy, Debug)]
pub struct DescTemplate {
    pub uuid: Uuid,
    pub req: Requirement,
    /// Index of the owning characteristic in [`SvcTemplate::chars`].
    pub owner: usize,
}

impl DescTemplate {
    /// Creates a mandatory descriptor template.
    #[inline]
    #[must_use]
    pub const fn mandatory(uuid: Uuid, owner: usize) -> Self {
        Self {
            uuid,
            req: Requirement::Mandatory,
            owner,
        }
    }

    /// Creates an optional descriptor template.
    #[inline]
    #[must_use]
    pub const fn optional(uuid: Uuid, owner: usize) -> Self {
        Self {
            uuid,
            req: Requirement::Optional,
            owner,
        }
    }
}

/// Declarative description of a peer service used to drive discovery and
/// validate its result.
#[derive(Clone, Copy, Debug)]
pub struct SvcTemplate {
    pub uuid: Uuid,
    pub chars: &'static [CharTemplate],
    pub descs: &'static [DescTemplate],
}

impl SvcTemplate {
    /// Verifies that every mandatory characteristic was found and that every
    /// found characteristic has at least the expected properties.
    pub fn check_chars(&self, c: &ServiceContent) -> Result<(), DiscoveryError> {
        for (t, d) in self.chars.iter().zip(c.chars()) {
            match d.val {
                None if t.req == Requirement::Mandatory => {
                    return Err(DiscoveryError::CharacteristicMissing)
                }
                Some(_) if !d.props.contains(t.props) => {
                    return Err(DiscoveryError::PropertyMismatch)
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Verifies that every mandatory descriptor of a found characteristic
    /// was found.
    pub fn check_descs(&self, c: &ServiceContent) -> Result<(), DiscoveryError> {
        let missing = (self.descs.iter().zip(c.descs())).any(|(t, d)| {
            t.req == Requirement::Mandatory
                && d.hdl.is_none()
                && c.chars().get(t.owner).map_or(false, |o| o.val.is_some())
        });
        if missing {
            return Err(DiscoveryError::DescriptorMissing);
        }
        Ok(())
    }

    /// Validates a previously discovered service content, such as one
    /// restored from bond storage.
    pub fn validate(&self, c: &ServiceContent) -> Result<(), DiscoveryError> {
        let in_range = |h: Option<_>| h.map_or(true, |h| c.range().contains(&h));
        if c.chars().len() != self.chars.len()
            || c.descs().len() != self.descs.len()
            || !c.chars().iter().all(|d| in_range(d.val))
            || !c.descs().iter().all(|d| in_range(d.hdl))
        {
            return Err(DiscoveryError::ServiceMissing);
        }
        self.check_chars(c)?;
        self.check_descs(c)
    }

    /// Returns the index of the first descriptor template owned by
    /// characteristic `owner` with the specified UUID.
    #[must_use]
    pub fn desc_of(&self, owner: usize, uuid: Uuid) -> Option<usize> {
        (self.descs.iter()).position(|t| t.owner == owner && t.uuid == uuid)
    }
}
