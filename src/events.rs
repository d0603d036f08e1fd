//! CDC events as values, and routing them to a handler
//!
//! USB stack glue describes what happened as a [`CdcEvent`] and hands it to
//! [`dispatch`]. [`SharedHandler`] lets several tasks feed the same handler.
//! [`ControlLineFilter`] separates control line changes from other control
//! requests that wake the same signal.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::notifier::{CdcEventHandler, InterfaceId, LineState};

/// A notification raised by the USB device stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdcEvent {
    /// The host changed the control lines
    LineStateChanged {
        interface: InterfaceId,
        state: LineState,
    },
    /// The host sent data
    DataReceived { interface: InterfaceId },
}

/// Route an event to the matching handler callback.
pub fn dispatch<H: CdcEventHandler + ?Sized>(handler: &mut H, event: CdcEvent) {
    match event {
        CdcEvent::LineStateChanged { interface, state } => {
            handler.on_line_state_changed(interface, state.dtr, state.rts)
        }
        CdcEvent::DataReceived { interface } => handler.on_data_received(interface),
    }
}

/// Decides whether a control-change wake-up is a line state change.
///
/// A CDC-ACM control signal also fires on SET_LINE_CODING (baud rate, framing).
/// Each wake-up is compared with the previous snapshot: a wake-up where only
/// the line coding moved is not a line state change. Anything else is,
/// including a request that repeats the current DTR/RTS values.
///
/// `C` is the line coding snapshot, compared for equality only.
pub struct ControlLineFilter<C> {
    last: Option<(C, LineState)>,
}

impl<C: PartialEq> ControlLineFilter<C> {
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Record a snapshot, returning the line state if it should be reported.
    pub fn update(&mut self, coding: C, state: LineState) -> Option<LineState> {
        let coding_only = match &self.last {
            Some((last_coding, last_state)) => *last_coding != coding && *last_state == state,
            None => false,
        };
        self.last = Some((coding, state));

        if coding_only {
            None
        } else {
            Some(state)
        }
    }
}

impl<C: PartialEq> Default for ControlLineFilter<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler shared between tasks through a blocking mutex.
///
/// The lock is held only for the duration of one callback.
pub struct SharedHandler<'a, M: RawMutex, H: CdcEventHandler> {
    inner: &'a Mutex<M, RefCell<H>>,
}

impl<'a, M: RawMutex, H: CdcEventHandler> SharedHandler<'a, M, H> {
    pub fn new(inner: &'a Mutex<M, RefCell<H>>) -> Self {
        Self { inner }
    }
}

impl<M: RawMutex, H: CdcEventHandler> Clone for SharedHandler<'_, M, H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: RawMutex, H: CdcEventHandler> Copy for SharedHandler<'_, M, H> {}

impl<M: RawMutex, H: CdcEventHandler> CdcEventHandler for SharedHandler<'_, M, H> {
    fn on_line_state_changed(&mut self, interface: InterfaceId, dtr: bool, rts: bool) {
        self.inner
            .lock(|cell| cell.borrow_mut().on_line_state_changed(interface, dtr, rts));
    }

    fn on_data_received(&mut self, interface: InterfaceId) {
        self.inner
            .lock(|cell| cell.borrow_mut().on_data_received(interface));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Target;
    use crate::notifier::{Notifier, TracingNotifier};
    use crate::sink::mock::MockDebugSink;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    fn attach(interface: u8) -> CdcEvent {
        CdcEvent::LineStateChanged {
            interface: InterfaceId(interface),
            state: LineState::new(true, false),
        }
    }

    fn detach(interface: u8) -> CdcEvent {
        CdcEvent::LineStateChanged {
            interface: InterfaceId(interface),
            state: LineState::new(false, true),
        }
    }

    fn data(interface: u8) -> CdcEvent {
        CdcEvent::DataReceived {
            interface: InterfaceId(interface),
        }
    }

    #[test]
    fn test_dispatch_matches_direct_calls() {
        let mut dispatched = TracingNotifier::new(MockDebugSink::new());
        let mut direct = TracingNotifier::new(MockDebugSink::new());

        for event in [attach(0), data(0), detach(0)] {
            dispatch(&mut dispatched, event);
        }
        direct.on_line_state_changed(InterfaceId(0), true, false);
        direct.on_data_received(InterfaceId(0));
        direct.on_line_state_changed(InterfaceId(0), false, true);

        assert_eq!(dispatched.sink().output(), direct.sink().output());
        assert_eq!(
            dispatched.sink().output(),
            "[sim] line-state dtr=1\n[sim] data-received\n[sim] line-state dtr=0\n"
        );
    }

    #[test]
    fn test_dispatch_to_silent_target() {
        let mut sink = MockDebugSink::new();
        {
            let mut notifier = Notifier::for_target(Target::Hardware, &mut sink);
            dispatch(&mut notifier, attach(1));
            dispatch(&mut notifier, data(1));
        }
        assert_eq!(sink.output(), "");
    }

    #[test]
    fn test_dispatch_through_trait_object() {
        let mut notifier = TracingNotifier::new(MockDebugSink::new());
        {
            let handler: &mut dyn CdcEventHandler = &mut notifier;
            dispatch(handler, data(2));
        }
        assert_eq!(notifier.sink().output(), "[sim] data-received\n");
    }

    const ON: LineState = LineState::new(true, false);
    const ON_RTS: LineState = LineState::new(true, true);
    const OFF: LineState = LineState::new(false, false);

    #[test]
    fn test_filter_reports_first_snapshot() {
        let mut filter = ControlLineFilter::new();
        assert_eq!(filter.update(115_200u32, OFF), Some(OFF));
    }

    #[test]
    fn test_filter_skips_baud_rate_change() {
        let mut filter = ControlLineFilter::new();
        filter.update(115_200u32, ON);

        // Only the line coding moved
        assert_eq!(filter.update(9_600, ON), None);
        assert_eq!(filter.update(57_600, ON), None);
    }

    #[test]
    fn test_filter_reports_line_changes() {
        let mut filter = ControlLineFilter::new();
        filter.update(115_200u32, OFF);

        assert_eq!(filter.update(115_200, ON), Some(ON));
        assert_eq!(filter.update(115_200, ON_RTS), Some(ON_RTS));
        assert_eq!(filter.update(115_200, OFF), Some(OFF));
    }

    #[test]
    fn test_filter_reports_repeated_state() {
        let mut filter = ControlLineFilter::new();
        filter.update(115_200u32, ON);

        // Same DTR/RTS request again, no coding change
        assert_eq!(filter.update(115_200, ON), Some(ON));
        assert_eq!(filter.update(115_200, ON), Some(ON));
    }

    #[test]
    fn test_filter_reports_lines_and_coding_together() {
        let mut filter = ControlLineFilter::new();
        filter.update(115_200u32, ON);
        assert_eq!(filter.update(9_600, OFF), Some(OFF));
    }

    #[test]
    fn test_filtered_wakeups_trace_only_line_changes() {
        let mut notifier = TracingNotifier::new(MockDebugSink::new());
        let mut filter = ControlLineFilter::new();

        for (coding, state) in [(115_200u32, ON), (9_600, ON), (9_600, OFF)] {
            if let Some(state) = filter.update(coding, state) {
                dispatch(
                    &mut notifier,
                    CdcEvent::LineStateChanged {
                        interface: InterfaceId(0),
                        state,
                    },
                );
            }
        }

        assert_eq!(
            notifier.sink().output(),
            "[sim] line-state dtr=1\n[sim] line-state dtr=0\n"
        );
    }

    #[test]
    fn test_shared_handler_copies_feed_one_notifier() {
        let shared: Mutex<NoopRawMutex, _> =
            Mutex::new(RefCell::new(TracingNotifier::new(MockDebugSink::new())));

        let mut line_task = SharedHandler::new(&shared);
        let mut rx_task = line_task;

        dispatch(&mut line_task, attach(0));
        dispatch(&mut rx_task, data(0));
        dispatch(&mut line_task, detach(0));

        shared.lock(|cell| {
            assert_eq!(
                cell.borrow().sink().output(),
                "[sim] line-state dtr=1\n[sim] data-received\n[sim] line-state dtr=0\n"
            );
        });
    }
}
