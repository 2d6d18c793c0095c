use profkit_const::{Characteristic, Descriptor, Service};
use tracing::warn;

use crate::gatt::{CharProps, CharTemplate, DescTemplate, SvcTemplate};
use crate::kernel::{Msg, TaskType, Value};
use crate::prf::ClientProfile;

use super::HrMeas;

/// Heart Rate Service as expected by the collector ([HRP] Section 4.4).
const HRS: SvcTemplate = SvcTemplate {
    uuid: Service::HeartRate.uuid(),
    chars: &[
        CharTemplate::mandatory(
            Characteristic::HeartRateMeasurement.uuid(),
            CharProps::NOTIFY,
        ),
        CharTemplate::optional(Characteristic::BodySensorLocation.uuid(), CharProps::READ),
        CharTemplate::optional(
            Characteristic::HeartRateControlPoint.uuid(),
            CharProps::WRITE,
        ),
    ],
    descs: &[DescTemplate::mandatory(
        Descriptor::ClientCharacteristicConfiguration.uuid(),
        HrCollector::MEAS,
    )],
};

/// Heart Rate collector profile. Measurements notified by the peer are
/// decoded and delivered to the application as [`Msg::HrMeasInd`].
#[derive(Debug, Default)]
pub struct HrCollector;

impl HrCollector {
    /// Heart Rate Measurement characteristic slot.
    pub const MEAS: usize = 0;
    /// Body Sensor Location characteristic slot.
    pub const BSL: usize = 1;
    /// Heart Rate Control Point characteristic slot.
    pub const CP: usize = 2;
    /// Measurement Client Characteristic Configuration descriptor slot.
    pub const MEAS_CCCD: usize = 0;
}

impl ClientProfile for HrCollector {
    const TYPE: TaskType = TaskType::HrpCollector;
    const SVC: &'static SvcTemplate = &HRS;

    fn value_ind(&mut self, i: usize, val: Value) -> Option<Msg> {
        if i != Self::MEAS {
            return None;
        }
        let m = HrMeas::unpack(&val);
        if m.is_none() {
            warn!("Invalid heart rate measurement: {val:?}");
        }
        m.map(Msg::HrMeasInd)
    }
}
