//! Data models for the records managed through the console.
//!
//! - `User`, `NewUser`, `DeviceAssignment`: user accounts and their device link
//! - `Device`, `DeviceForm`: registered devices
//! - `RecordId`: backend identifiers (integer or string)

pub mod device;
pub mod id;
pub mod user;

pub use device::{Device, DeviceForm, UNNAMED_DEVICE};
pub use id::RecordId;
pub use user::{DeviceAssignment, NewUser, User};
