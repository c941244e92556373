pub mod backoff;
pub mod config;
pub mod device;
pub mod error;
pub mod memory;
pub mod network;
pub mod notify;
pub mod ota;
pub mod sensor;
pub mod state_machine;
pub mod watchdog;

pub mod prelude {
    pub use crate::{
        config::*, error::*, network::*, notify::*, ota::OtaUpdater, sensor::*,
        state_machine::*, watchdog::*,
    };
    pub use common::{DoorState, Notification};
}
