//! CDC event notifier
//!
//! Handles the two notifications a USB device stack raises for a CDC-ACM
//! interface: control line changes (DTR/RTS) and data arriving from the host.
//!
//! Handling is limited to debug tracing on simulated hardware. Every call is
//! independent; no connection state is kept between calls, and the receive
//! notification never reads the data that triggered it.

use crate::config::{trace, Target};
use crate::sink::DebugSink;

/// Logical CDC interface number assigned by the USB stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterfaceId(pub u8);

/// Control line state reported by the host terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineState {
    /// Data Terminal Ready (terminal open)
    pub dtr: bool,
    /// Request To Send
    pub rts: bool,
}

impl LineState {
    pub const fn new(dtr: bool, rts: bool) -> Self {
        Self { dtr, rts }
    }

    /// Returns true if a terminal is attached (DTR asserted)
    pub const fn is_attached(&self) -> bool {
        self.dtr
    }
}

/// Callbacks invoked by the USB device stack.
///
/// Both run in the stack's dispatch context and must return promptly:
/// no blocking, no allocation, no failure.
pub trait CdcEventHandler {
    /// The host changed the DTR/RTS control lines
    fn on_line_state_changed(&mut self, interface: InterfaceId, dtr: bool, rts: bool);

    /// The host sent data on the interface
    fn on_data_received(&mut self, interface: InterfaceId);
}

impl<H: CdcEventHandler + ?Sized> CdcEventHandler for &mut H {
    fn on_line_state_changed(&mut self, interface: InterfaceId, dtr: bool, rts: bool) {
        (**self).on_line_state_changed(interface, dtr, rts)
    }

    fn on_data_received(&mut self, interface: InterfaceId) {
        (**self).on_data_received(interface)
    }
}

/// Notifier that traces every event to a debug sink.
pub struct TracingNotifier<S: DebugSink> {
    sink: S,
}

impl<S: DebugSink> TracingNotifier<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Get a reference to the debug sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the notifier, returning the debug sink
    pub fn into_sink(self) -> S {
        self.sink
    }
}

impl<S: DebugSink> CdcEventHandler for TracingNotifier<S> {
    fn on_line_state_changed(&mut self, interface: InterfaceId, dtr: bool, rts: bool) {
        log::trace!("cdc{}: line state dtr={} rts={}", interface.0, dtr, rts);

        // TODO: drive a connection indicator from rts once flow control exists
        let line = if LineState::new(dtr, rts).is_attached() {
            trace::LINE_STATE_ATTACHED
        } else {
            trace::LINE_STATE_DETACHED
        };
        self.sink.write_raw_str(line);
    }

    fn on_data_received(&mut self, interface: InterfaceId) {
        log::trace!("cdc{}: data received", interface.0);
        self.sink.write_raw_str(trace::DATA_RECEIVED);
    }
}

/// Notifier that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

impl CdcEventHandler for SilentNotifier {
    fn on_line_state_changed(&mut self, _interface: InterfaceId, _dtr: bool, _rts: bool) {}

    fn on_data_received(&mut self, _interface: InterfaceId) {}
}

/// Notifier selected for a build target at startup.
pub enum Notifier<S: DebugSink> {
    Tracing(TracingNotifier<S>),
    Silent(SilentNotifier),
}

impl<S: DebugSink> Notifier<S> {
    /// Create the notifier for the given target.
    ///
    /// The sink is dropped on targets that do not trace.
    pub fn for_target(target: Target, sink: S) -> Self {
        if target.traces_events() {
            Self::Tracing(TracingNotifier::new(sink))
        } else {
            Self::Silent(SilentNotifier)
        }
    }

    /// Create the notifier for the target this crate was built for.
    pub fn from_build(sink: S) -> Self {
        Self::for_target(Target::from_build(), sink)
    }
}

impl<S: DebugSink> CdcEventHandler for Notifier<S> {
    fn on_line_state_changed(&mut self, interface: InterfaceId, dtr: bool, rts: bool) {
        match self {
            Self::Tracing(n) => n.on_line_state_changed(interface, dtr, rts),
            Self::Silent(n) => n.on_line_state_changed(interface, dtr, rts),
        }
    }

    fn on_data_received(&mut self, interface: InterfaceId) {
        match self {
            Self::Tracing(n) => n.on_data_received(interface),
            Self::Silent(n) => n.on_data_received(interface),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::mock::MockDebugSink;

    fn simulated(sink: &mut MockDebugSink) -> Notifier<&mut MockDebugSink> {
        Notifier::for_target(Target::SimulatedHardware, sink)
    }

    fn hardware(sink: &mut MockDebugSink) -> Notifier<&mut MockDebugSink> {
        Notifier::for_target(Target::Hardware, sink)
    }

    #[test]
    fn test_attach_traces_dtr_1() {
        for id in [0u8, 1, 7, 255] {
            for rts in [false, true] {
                let mut sink = MockDebugSink::new();
                simulated(&mut sink).on_line_state_changed(InterfaceId(id), true, rts);
                assert_eq!(sink.output(), "[sim] line-state dtr=1\n");
                assert_eq!(sink.write_count(), 1);
            }
        }
    }

    #[test]
    fn test_detach_traces_dtr_0() {
        for id in [0u8, 3, 255] {
            for rts in [false, true] {
                let mut sink = MockDebugSink::new();
                simulated(&mut sink).on_line_state_changed(InterfaceId(id), false, rts);
                assert_eq!(sink.output(), "[sim] line-state dtr=0\n");
            }
        }
    }

    #[test]
    fn test_data_received_trace() {
        for id in [0u8, 2, 255] {
            let mut sink = MockDebugSink::new();
            simulated(&mut sink).on_data_received(InterfaceId(id));
            assert_eq!(sink.output(), "[sim] data-received\n");
        }
    }

    #[test]
    fn test_hardware_target_is_silent() {
        let mut sink = MockDebugSink::new();
        {
            let mut notifier = hardware(&mut sink);
            assert!(matches!(notifier, Notifier::Silent(_)));
            notifier.on_line_state_changed(InterfaceId(0), true, false);
            notifier.on_line_state_changed(InterfaceId(0), false, true);
            notifier.on_data_received(InterfaceId(0));
        }
        assert_eq!(sink.output(), "");
        assert_eq!(sink.write_count(), 0);
    }

    #[test]
    fn test_repeated_events_not_deduplicated() {
        let mut sink = MockDebugSink::new();
        {
            let mut notifier = simulated(&mut sink);
            for _ in 0..3 {
                notifier.on_line_state_changed(InterfaceId(0), true, false);
            }
            for _ in 0..2 {
                notifier.on_data_received(InterfaceId(0));
            }
        }
        assert_eq!(
            sink.output(),
            "[sim] line-state dtr=1\n[sim] line-state dtr=1\n[sim] line-state dtr=1\n\
             [sim] data-received\n[sim] data-received\n"
        );
        assert_eq!(sink.write_count(), 5);
    }

    #[test]
    fn test_rts_does_not_affect_output() {
        for dtr in [false, true] {
            let mut with_rts = MockDebugSink::new();
            let mut without_rts = MockDebugSink::new();
            simulated(&mut with_rts).on_line_state_changed(InterfaceId(4), dtr, true);
            simulated(&mut without_rts).on_line_state_changed(InterfaceId(4), dtr, false);
            assert_eq!(with_rts.output(), without_rts.output());
        }
    }

    #[test]
    fn test_attach_data_detach_sequence() {
        let mut sink = MockDebugSink::new();
        {
            let mut notifier = simulated(&mut sink);
            notifier.on_line_state_changed(InterfaceId(0), true, false);
            notifier.on_data_received(InterfaceId(0));
            notifier.on_line_state_changed(InterfaceId(0), false, false);
        }
        assert_eq!(
            sink.output(),
            "[sim] line-state dtr=1\n[sim] data-received\n[sim] line-state dtr=0\n"
        );
    }

    #[test]
    fn test_tracing_notifier_direct() {
        let mut notifier = TracingNotifier::new(MockDebugSink::new());
        notifier.on_data_received(InterfaceId(1));
        assert_eq!(notifier.sink().output(), "[sim] data-received\n");

        let sink = notifier.into_sink();
        assert_eq!(sink.write_count(), 1);
    }

    #[test]
    fn test_handler_through_mut_ref() {
        fn attach<H: CdcEventHandler>(mut handler: H) {
            handler.on_line_state_changed(InterfaceId(0), true, true);
        }

        let mut notifier = TracingNotifier::new(MockDebugSink::new());
        attach(&mut notifier);
        assert_eq!(notifier.sink().output(), "[sim] line-state dtr=1\n");
    }

    #[test]
    fn test_silent_notifier_direct() {
        let mut notifier = SilentNotifier;
        notifier.on_line_state_changed(InterfaceId(0), true, true);
        notifier.on_data_received(InterfaceId(0));
    }

    #[test]
    fn test_line_state_attached() {
        assert!(LineState::new(true, false).is_attached());
        assert!(!LineState::new(false, true).is_attached());
        assert_eq!(LineState::default(), LineState::new(false, false));
    }
}
