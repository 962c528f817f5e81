//! Device inventory.
//!
//! Records describe how to reach a device; credentials are kept out of
//! this module entirely and live in the [`vault`](crate::vault).

mod record;
mod store;

pub use record::{DeviceRecord, Transport, DEFAULT_DEVICE_TYPE};
pub use store::InventoryStore;
