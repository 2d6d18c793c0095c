//! Heart Rate Profile ([HRP]) and Heart Rate Service ([HRS]).

pub use {collector::*, meas::*, sensor::*};

use super::{Client, Server};

mod collector;
mod meas;
mod sensor;

/// Heart Rate collector task with one instance per connection.
pub type HrpCollector = Client<HrCollector>;

/// Heart Rate sensor task.
pub type HrpSensor = Server<HrSensor>;

/// Body Sensor Location characteristic value ([HRS] Section 3.2).
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum BodySensorLocation {
    Other = 0,
    Chest = 1,
    Wrist = 2,
    Finger = 3,
    Hand = 4,
    EarLobe = 5,
    Foot = 6,
}

crate::util::impl_display_via_debug! { BodySensorLocation }
