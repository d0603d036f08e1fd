//! Tasks translating CDC-ACM endpoint activity into notifier events.
//!
//! Generic over any embassy-usb driver, so the firmware wraps them in
//! concrete `#[embassy_executor::task]` functions.

use embassy_usb::class::cdc_acm::{ControlChanged, LineCoding, Receiver, Sender};
use embassy_usb::driver::{Driver, EndpointError};

use crate::config;
use crate::events::{dispatch, CdcEvent, ControlLineFilter};
use crate::notifier::{CdcEventHandler, InterfaceId, LineState};

/// Comparable snapshot of a line coding (rate, data bits, stop bits, parity)
type CodingSnapshot = (u32, u8, u8, u8);

fn coding_snapshot(coding: &LineCoding) -> CodingSnapshot {
    (
        coding.data_rate(),
        coding.data_bits(),
        coding.stop_bits() as u8,
        coding.parity_type() as u8,
    )
}

/// Task that reports DTR/RTS changes on a CDC-ACM interface.
///
/// The change signal also fires on SET_LINE_CODING and bus reset, so each
/// wake-up is snapshotted and coding-only changes are skipped. The signal is
/// a single flag: changes arriving before the task runs again are merged,
/// and only the latest line state is reported.
pub async fn line_state_task<'d, D: Driver<'d>, H: CdcEventHandler>(
    control: ControlChanged<'d>,
    sender: Sender<'d, D>,
    interface: InterfaceId,
    mut handler: H,
) {
    let mut filter = ControlLineFilter::new();

    loop {
        control.control_changed().await;

        let state = LineState::new(sender.dtr(), sender.rts());
        let coding = coding_snapshot(&sender.line_coding());
        if let Some(state) = filter.update(coding, state) {
            dispatch(&mut handler, CdcEvent::LineStateChanged { interface, state });
        }
    }
}

/// Task that reports data arriving on a CDC-ACM interface.
///
/// embassy-usb only signals received data by handing over a packet, so the
/// packet is taken off the endpoint and discarded. Nothing consumes the data.
pub async fn data_received_task<'d, D: Driver<'d>, H: CdcEventHandler>(
    mut receiver: Receiver<'d, D>,
    interface: InterfaceId,
    mut handler: H,
) {
    let mut packet = [0u8; config::usb::MAX_PACKET_SIZE as usize];

    loop {
        // Wait for the host to configure the interface
        receiver.wait_connection().await;

        match receiver.read_packet(&mut packet).await {
            Ok(0) => continue,
            // Oversized packet: data still arrived
            Ok(_) | Err(EndpointError::BufferOverflow) => {
                dispatch(&mut handler, CdcEvent::DataReceived { interface })
            }
            Err(EndpointError::Disabled) => {
                // Device reset or unplugged, wait_connection() covers it
            }
        }
    }
}
