#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod events;
pub mod notifier;
pub mod sink;

// USB glue depends on embassy-usb, only available with embedded feature
#[cfg(feature = "embedded")]
pub mod usb;
