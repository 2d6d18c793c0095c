use bitflags::bitflags;
use smallvec::SmallVec;
use structbuf::Unpack;

use crate::gatt::RequestError;
use crate::kernel::Value;

bitflags! {
    /// Heart Rate Measurement flags ([HRS] Section 3.1.1.1).
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[repr(transparent)]
    pub struct HrFlags: u8 {
        /// Heart rate value is a `u16`.
        const U16 = 0x01;
        /// Skin contact detected. Valid only with `CONTACT_SUPPORTED`.
        const CONTACT_DETECTED = 0x02;
        const CONTACT_SUPPORTED = 0x04;
        /// Energy expended field present.
        const ENERGY = 0x08;
        /// One or more RR-interval values present.
        const RR = 0x10;
    }
}

/// Heart Rate Measurement record.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HrMeas {
    pub flags: HrFlags,
    /// Beats per minute.
    pub heart_rate: u16,
    /// Energy expended in kilojoules.
    pub energy: u16,
    /// RR-intervals in 1/1024 second units, oldest first.
    pub rr: SmallVec<[u16; HrMeas::MAX_RR]>,
}

impl HrMeas {
    /// Maximum number of RR-interval values in one record.
    pub const MAX_RR: usize = 4;

    /// Maximum encoded length.
    const MAX_LEN: usize = 1 + 2 + 2 + 2 * Self::MAX_RR;

    /// Creates a measurement, selecting the 16-bit format when the heart
    /// rate does not fit in one byte.
    #[must_use]
    pub fn new(heart_rate: u16) -> Self {
        let mut flags = HrFlags::empty();
        flags.set(HrFlags::U16, heart_rate > u16::from(u8::MAX));
        Self {
            flags,
            heart_rate,
            ..Self::default()
        }
    }

    /// Sets the skin contact status.
    #[must_use]
    pub fn with_contact(mut self, detected: bool) -> Self {
        self.flags |= HrFlags::CONTACT_SUPPORTED;
        self.flags.set(HrFlags::CONTACT_DETECTED, detected);
        self
    }

    /// Sets the energy expended field.
    #[must_use]
    pub fn with_energy(mut self, kj: u16) -> Self {
        self.flags |= HrFlags::ENERGY;
        self.energy = kj;
        self
    }

    /// Sets the RR-interval values.
    #[must_use]
    pub fn with_rr(mut self, rr: impl IntoIterator<Item = u16>) -> Self {
        self.rr = rr.into_iter().collect();
        self.flags.set(HrFlags::RR, !self.rr.is_empty());
        self
    }

    /// Encodes the record. Fails if the fields are inconsistent with the
    /// flags.
    pub fn pack(&self) -> Result<Value, RequestError> {
        let f = self.flags;
        if (!f.contains(HrFlags::U16) && self.heart_rate > u16::from(u8::MAX))
            || f.contains(HrFlags::RR) == self.rr.is_empty()
            || self.rr.len() > Self::MAX_RR
        {
            return Err(RequestError::InvalidParameter);
        }
        let mut v = Value::alloc(Self::MAX_LEN);
        {
            let mut p = v.append();
            p.u8(f.bits());
            if f.contains(HrFlags::U16) {
                p.u16(self.heart_rate);
            } else {
                #[allow(clippy::cast_possible_truncation)]
                p.u8(self.heart_rate as u8);
            }
            if f.contains(HrFlags::ENERGY) {
                p.u16(self.energy);
            }
            for &rr in &self.rr {
                p.u16(rr);
            }
        }
        Ok(v)
    }

    /// Decodes a record. Returns [`None`] if the length does not match the
    /// flags.
    #[must_use]
    pub fn unpack(v: &[u8]) -> Option<Self> {
        let flags = HrFlags::from_bits_retain(*v.first()?);
        let fixed = 1
            + if flags.contains(HrFlags::U16) { 2 } else { 1 }
            + if flags.contains(HrFlags::ENERGY) { 2 } else { 0 };
        let rr = v.len().checked_sub(fixed)?;
        if rr % 2 != 0 || rr / 2 > Self::MAX_RR || (rr > 0) != flags.contains(HrFlags::RR) {
            return None;
        }
        v.unpack().map(|p| {
            p.u8();
            Self {
                flags,
                heart_rate: if flags.contains(HrFlags::U16) {
                    p.u16()
                } else {
                    u16::from(p.u8())
                },
                energy: if flags.contains(HrFlags::ENERGY) {
                    p.u16()
                } else {
                    0
                },
                rr: (0..rr / 2).map(|_| p.u16()).collect(),
            }
        })
    }
}
