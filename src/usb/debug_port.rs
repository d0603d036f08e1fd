//! Debug output via a second USB CDC-ACM port.
//!
//! The OTG peripheral takes the ESP32-S3's USB PHY away from USB-Serial/JTAG,
//! so trace text is queued into a pipe by [`PipeSink`](crate::sink::PipeSink)
//! and sent to the host from here. Output is dropped while the pipe is full.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::pipe::Pipe;
use embassy_usb::class::cdc_acm::Sender;
use embassy_usb::driver::Driver;

use crate::config;

/// Debug writer task that sends queued trace text to the CDC port.
pub async fn debug_writer_task<'d, D: Driver<'d>, M: RawMutex, const N: usize>(
    pipe: &Pipe<M, N>,
    mut sender: Sender<'d, D>,
) {
    let mut packet = [0u8; config::usb::MAX_PACKET_SIZE as usize];

    loop {
        sender.wait_connection().await;

        let n = pipe.read(&mut packet).await;
        // Ignore errors (port might have been reset)
        let _ = sender.write_packet(&packet[..n]).await;
    }
}
