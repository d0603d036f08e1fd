//! USB OTG glue for the CDC event notifier.
//!
//! Two CDC-ACM ports:
//! - CDC0: watched for events; control line changes go to
//!   `on_line_state_changed`, OUT packets to `on_data_received`
//! - CDC1: debug trace output

pub mod cdc_events;
pub mod debug_port;

pub use cdc_events::{data_received_task, line_state_task};
pub use debug_port::debug_writer_task;
