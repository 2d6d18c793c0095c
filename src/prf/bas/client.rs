use profkit_const::{Characteristic, Descriptor, Service};

use crate::gatt::{CharProps, CharTemplate, DescTemplate, SvcTemplate};
use crate::kernel::TaskType;
use crate::prf::ClientProfile;

/// Battery Service as expected by the client. Level notifications are
/// optional for the peer.
const BAS: SvcTemplate = SvcTemplate {
    uuid: Service::Battery.uuid(),
    chars: &[CharTemplate::mandatory(
        Characteristic::BatteryLevel.uuid(),
        CharProps::READ,
    )],
    descs: &[DescTemplate::optional(
        Descriptor::ClientCharacteristicConfiguration.uuid(),
        BatteryClient::LEVEL,
    )],
};

/// Battery Service client profile. Level notifications are delivered to the
/// application as [`crate::kernel::Msg::ValueInd`].
#[derive(Debug, Default)]
pub struct BatteryClient;

impl BatteryClient {
    /// Battery Level characteristic slot.
    pub const LEVEL: usize = 0;
    /// Battery Level Client Characteristic Configuration descriptor slot.
    pub const LEVEL_CCCD: usize = 0;
}

impl ClientProfile for BatteryClient {
    const TYPE: TaskType = TaskType::BasClient;
    const SVC: &'static SvcTemplate = &BAS;
}
