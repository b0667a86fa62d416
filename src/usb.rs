//! USB Subsystem
//!
//! Embassy glue for the bridge:
//! - [`cdc::EmbassyStack`] implements the device stack seam over `embassy-usb`
//! - [`cdc::CdcAcmPort`] is the ACM function, with [`cdc::ControlPort`]
//!   routing class requests and bus suspend into the bridge
//! - [`cdc::run_device`] / [`cdc::run_cdc`] are the tasks that move packets

pub mod cdc;
