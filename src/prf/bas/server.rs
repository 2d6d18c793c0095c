use crate::att::{ErrorCode, EventType, Handle};
use crate::gatt::RequestError;
use crate::kernel::{ConnIdx, Msg, MsgKind, TaskType, Value};
use crate::prf::ServerProfile;

/// Battery Service server profile serving a database starting at the
/// service declaration handle `base`, followed by the Battery Level
/// declaration, value, and CCCD.
#[derive(Debug)]
pub struct BatteryServer {
    base: Handle,
    level: u8,
}

impl BatteryServer {
    /// Maximum battery level in percent.
    pub const MAX_LEVEL: u8 = 100;

    /// Creates a server profile reporting `level`.
    #[inline]
    #[must_use]
    pub const fn new(base: Handle, level: u8) -> Self {
        Self { base, level }
    }

    /// Returns the current battery level.
    #[inline(always)]
    #[must_use]
    pub const fn level(&self) -> u8 {
        self.level
    }
}

impl ServerProfile for BatteryServer {
    const TYPE: TaskType = TaskType::BasServer;
    const SEND: MsgKind = MsgKind::LevelSendReq;
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
        match *msg {
            Msg::LevelSendReq { level } if level <= Self::MAX_LEVEL => {
                self.level = level;
                Ok((Value::from_slice(&[level]), None))
            }
            _ => Err(RequestError::InvalidParameter),
        }
    }

    fn read(&self, hdl: Handle) -> Option<Result<Value, ErrorCode>> {
        (hdl == self.val_hdl()).then(|| Ok(Value::from_slice(&[self.level])))
    }

    fn write(
        &mut self,
        _: ConnIdx,
        hdl: Handle,
        _: &[u8],
    ) -> Option<Result<Option<Msg>, ErrorCode>> {
        (hdl == self.val_hdl()).then_some(Err(ErrorCode::WriteNotPermitted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level() {
        let mut s = BatteryServer::new(Handle::new(0x20).unwrap(), 50);
        let (v, excluded) = s.prepare(&Msg::LevelSendReq { level: 100 }).unwrap();
        assert_eq!((&*v, excluded), (&[100][..], None));
        assert_eq!(s.level(), 100);
        assert_eq!(
            s.prepare(&Msg::LevelSendReq { level: 101 }).err(),
            Some(RequestError::InvalidParameter)
        );
        assert_eq!(s.level(), 100);
        assert_eq!(s.read(s.val_hdl()), Some(Ok(Value::from_slice(&[100]))));
        assert_eq!(s.read(s.cccd_hdl()), None);
    }
}
