use bitflags::bitflags;

use super::RequestError;

bitflags! {
    /// Characteristic properties ([Vol 3] Part G, Section 3.3.1.1).
    #[derive(
        Clone, Copy, Debug, Default, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize,
    )]
    #[repr(transparent)]
    #[serde(transparent)]
    pub struct CharProps: u8 {
        /// Permits broadcasts of the Characteristic Value using Server
        /// Characteristic Configuration Descriptor. If set, the Server
        /// Characteristic Configuration Descriptor shall exist.
        const BROADCAST = 0x01;
        /// Permits reads of the Characteristic Value.
        const READ = 0x02;
        /// Permit writes of the Characteristic Value without response.
        const WRITE_WITHOUT_RESPONSE = 0x04;
        /// Permits writes of the Characteristic Value with response.
        const WRITE = 0x08;
        /// Permits notifications of a Characteristic Value without
        /// acknowledgment. If set, the Client Characteristic Configuration
        /// Descriptor shall exist.
        const NOTIFY = 0x10;
        /// Permits indications of a Characteristic Value with acknowledgment.
        /// If set, the Client Characteristic Configuration Descriptor shall
        /// exist.
        const INDICATE = 0x20;
        /// Permits signed writes to the Characteristic Value.
        const AUTHENTICATED_SIGNED_WRITES = 0x40;
        /// Additional characteristic properties are defined in the
        /// Characteristic Extended Properties Descriptor. If set, the
        /// Characteristic Extended Properties Descriptor shall exist.
        const EXTENDED_PROPERTIES = 0x80;
    }
}

bitflags! {
    /// Client Characteristic Configuration descriptor value
    /// ([Vol 3] Part G, Section 3.3.3.3).
    #[derive(
        Clone, Copy, Debug, Default, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize,
    )]
    #[repr(transparent)]
    #[serde(transparent)]
    pub struct Cccd: u16 {
        /// The Characteristic Value shall be notified. This value can only be
        /// set if the characteristic's properties have the `NOTIFY` bit set.
        const NOTIFY = 1 << 0;
        /// The Characteristic Value shall be indicated. This value can only be
        /// set if the characteristic's properties have the `INDICATE` bit set.
        const INDICATE = 1 << 1;
    }
}

impl Cccd {
    /// Validates a raw descriptor value for a characteristic whose only legal
    /// enable bit is `enable`. Accepted values are `0x0000` and `enable`.
    #[inline]
    pub fn validate(raw: u16, enable: Self) -> Result<Self, RequestError> {
        match Self::from_bits(raw) {
            Some(v) if v.is_empty() || v == enable => Ok(v),
            _ => Err(RequestError::InvalidParameter),
        }
    }

    /// Parses a little-endian descriptor value written by a peer.
    #[inline]
    pub fn from_le_slice(v: &[u8], enable: Self) -> Result<Self, RequestError> {
        match *v {
            [lo, hi] => Self::validate(u16::from_le_bytes([lo, hi]), enable),
            _ => Err(RequestError::InvalidParameter),
        }
    }

    /// Returns the enable bit matching the characteristic properties, if
    /// any. Notification takes precedence when both are permitted.
    #[inline]
    #[must_use]
    pub fn enable_for(props: CharProps) -> Option<Self> {
        if props.contains(CharProps::NOTIFY) {
            Some(Self::NOTIFY)
        } else if props.contains(CharProps::INDICATE) {
            Some(Self::INDICATE)
        } else {
            None
        }
    }

    /// Returns the descriptor value in little-endian byte order.
    #[inline(always)]
    #[must_use]
    pub const fn to_le_bytes(self) -> [u8; 2] {
        self.bits().to_le_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cccd_validate() {
        assert_eq!(Cccd::validate(0, Cccd::NOTIFY), Ok(Cccd::empty()));
        assert_eq!(Cccd::validate(1, Cccd::NOTIFY), Ok(Cccd::NOTIFY));
        assert_eq!(Cccd::validate(2, Cccd::INDICATE), Ok(Cccd::INDICATE));
        for raw in [2, 3, 4, 0x100, 0xFFFF] {
            assert_eq!(
                Cccd::validate(raw, Cccd::NOTIFY),
                Err(RequestError::InvalidParameter)
            );
        }
        assert_eq!(Cccd::from_le_slice(&[1, 0], Cccd::NOTIFY), Ok(Cccd::NOTIFY));
        assert!(Cccd::from_le_slice(&[1], Cccd::NOTIFY).is_err());
        assert_eq!(Cccd::INDICATE.to_le_bytes(), [2, 0]);
    }

    #[test]
    fn enable_for() {
        assert_eq!(Cccd::enable_for(CharProps::READ), None);
        assert_eq!(
            Cccd::enable_for(CharProps::READ | CharProps::INDICATE),
            Some(Cccd::INDICATE)
        );
        assert_eq!(
            Cccd::enable_for(CharProps::NOTIFY | CharProps::INDICATE),
            Some(Cccd::NOTIFY)
        );
    }
}
