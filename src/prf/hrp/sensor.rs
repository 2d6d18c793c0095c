use tracing::debug;

use crate::att::{ErrorCode, EventType, Handle};
use crate::gatt::RequestError;
use crate::kernel::{ConnIdx, Msg, MsgKind, TaskType, Value};
use crate::prf::ServerProfile;

use super::BodySensorLocation;

/// Heart Rate Control Point value that resets the energy expended field.
const RESET_ENERGY: u8 = 0x01;

/// Optional Heart Rate sensor features.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SensorFeatures {
    /// Body Sensor Location characteristic value, if supported.
    pub location: Option<BodySensorLocation>,
    /// Energy expended support, which adds the Heart Rate Control Point.
    pub energy: bool,
}

/// Heart Rate sensor profile serving a Heart Rate Service database starting
/// at the service declaration handle `base`. Attributes are laid out in
/// order: Heart Rate Measurement declaration, value, and CCCD, then the
/// optional Body Sensor Location and Heart Rate Control Point declarations
/// and values.
#[derive(Debug)]
pub struct HrSensor {
    base: Handle,
    feat: SensorFeatures,
}

impl HrSensor {
    /// Creates a sensor profile.
    #[inline]
    #[must_use]
    pub const fn new(base: Handle, feat: SensorFeatures) -> Self {
        Self { base, feat }
    }

    /// Returns the supported features.
    #[inline(always)]
    #[must_use]
    pub const fn features(&self) -> SensorFeatures {
        self.feat
    }

    /// Returns the Body Sensor Location value handle.
    #[must_use]
    pub const fn bsl_hdl(&self) -> Option<Handle> {
        match self.feat.location {
            Some(_) => Some(self.base.offset(5)),
            None => None,
        }
    }

    /// Returns the Heart Rate Control Point value handle.
    #[must_use]
    pub const fn cp_hdl(&self) -> Option<Handle> {
        if !self.feat.energy {
            return None;
        }
        Some(self.base.offset(if self.feat.location.is_some() { 7 } else { 5 }))
    }
}

impl ServerProfile for HrSensor {
    const TYPE: TaskType = TaskType::HrpSensor;
    const SEND: MsgKind = MsgKind::HrMeasSendReq;
    const EVENT: EventType = EventType::Notify;

    #[inline]
    fn val_hdl(&self) -> Handle {
        self.base.offset(2)
    }

    #[inline]
    fn cccd_hdl(&self) -> Handle {
        self.base.offset(3)
    }

    fn prepare(&mut self, msg: &Msg) -> Result<(Value, Option<ConnIdx>), RequestError> {
        let Msg::HrMeasSendReq { ref meas, excluded } = *msg else {
            return Err(RequestError::InvalidParameter);
        };
        if meas.flags.contains(super::HrFlags::ENERGY) && !self.feat.energy {
            return Err(RequestError::FeatureNotSupported);
        }
        Ok((meas.pack()?, excluded))
    }

    fn read(&self, hdl: Handle) -> Option<Result<Value, ErrorCode>> {
        if hdl == self.val_hdl() || Some(hdl) == self.cp_hdl() {
            return Some(Err(ErrorCode::ReadNotPermitted));
        }
        match self.feat.location {
            Some(loc) if Some(hdl) == self.bsl_hdl() => Some(Ok(Value::from_slice(&[loc.into()]))),
            _ => None,
        }
    }

    fn write(
        &mut self,
        c: ConnIdx,
        hdl: Handle,
        val: &[u8],
    ) -> Option<Result<Option<Msg>, ErrorCode>> {
        if hdl == self.val_hdl() || Some(hdl) == self.bsl_hdl() {
            return Some(Err(ErrorCode::WriteNotPermitted));
        }
        if Some(hdl) != self.cp_hdl() {
            return None;
        }
        Some(match *val {
            [RESET_ENERGY] => {
                debug!("{c}: Energy expended reset");
                Ok(Some(Msg::EnergyResetInd { conn: c }))
            }
            _ => Err(ErrorCode::ControlPointNotSupported),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor(location: Option<BodySensorLocation>, energy: bool) -> HrSensor {
        let base = Handle::new(0x10).unwrap();
        HrSensor::new(base, SensorFeatures { location, energy })
    }

    #[test]
    fn layout() {
        let h = |v| Handle::new(v).unwrap();
        let s = sensor(Some(BodySensorLocation::Chest), true);
        assert_eq!((s.val_hdl(), s.cccd_hdl()), (h(0x12), h(0x13)));
        assert_eq!((s.bsl_hdl(), s.cp_hdl()), (Some(h(0x15)), Some(h(0x17))));
        let s = sensor(None, true);
        assert_eq!((s.bsl_hdl(), s.cp_hdl()), (None, Some(h(0x15))));
        let s = sensor(None, false);
        assert_eq!((s.bsl_hdl(), s.cp_hdl()), (None, None));
    }

    #[test]
    fn control_point() {
        let c = ConnIdx::new(1);
        let mut s = sensor(None, true);
        let cp = s.cp_hdl().unwrap();
        assert_eq!(
            s.write(c, cp, &[RESET_ENERGY]),
            Some(Ok(Some(Msg::EnergyResetInd { conn: c })))
        );
        assert_eq!(
            s.write(c, cp, &[0x02]),
            Some(Err(ErrorCode::ControlPointNotSupported))
        );
        assert_eq!(s.read(cp), Some(Err(ErrorCode::ReadNotPermitted)));
        assert_eq!(s.write(c, s.val_hdl(), &[0]), Some(Err(ErrorCode::WriteNotPermitted)));
        assert_eq!(s.write(c, Handle::MAX, &[0]), None);
    }

    #[test]
    fn body_sensor_location() {
        let s = sensor(Some(BodySensorLocation::Wrist), false);
        let v = s.read(s.bsl_hdl().unwrap()).unwrap().unwrap();
        assert_eq!(&*v, &[2]);
        assert_eq!(BodySensorLocation::try_from(5).ok(), Some(BodySensorLocation::EarLobe));
    }

    #[test]
    fn prepare() {
        let mut s = sensor(None, false);
        let meas = crate::prf::hrp::HrMeas::new(60).with_energy(1);
        let msg = Msg::HrMeasSendReq { meas, excluded: None };
        assert_eq!(s.prepare(&msg).err(), Some(RequestError::FeatureNotSupported));
        let meas = crate::prf::hrp::HrMeas::new(60);
        let msg = Msg::HrMeasSendReq { meas, excluded: Some(ConnIdx::new(1)) };
        let (v, excluded) = s.prepare(&msg).unwrap();
        assert_eq!((&*v, excluded), (&[0, 60][..], Some(ConnIdx::new(1))));
    }
}
