//! The event source: waits for the connection to become readable, pulls wire
//! events in batches and turns them into queued toolkit events.
//!
//! Every wire event passes through the filters first (global ones, then the
//! ones of its window), and through the translators only if no filter
//! claimed it.

use crate::{
    display::Display,
    error::Result,
    event::{Event, EventKind},
    protocols::FilterReturn,
    x::event::{XEvent, XEventKind},
};

impl Display {
    /// Wait up to `timeout_ms` (negative blocks) for events and translate
    /// everything that arrived. Returns the number of queued toolkit events.
    pub fn dispatch(&mut self, timeout_ms: i32) -> Result<usize> {
        if self.closed {
            return Ok(self.queue.len());
        }

        self.flush()?;
        self.watch_connections();

        if !self.has_pending() {
            let readiness = self.watch.wait(timeout_ms)?;
            for fd in readiness.internal {
                log::trace!("internal connection fd={} is readable", fd);
                self.transport.process_internal_connection(fd);
            }
        }

        self.queue_pending()?;
        self.watch_connections();
        Ok(self.queue.len())
    }

    /// Translate every event the transport already has, without waiting.
    /// Returns how many toolkit events were added to the queue.
    pub fn queue_pending(&mut self) -> Result<usize> {
        let before = self.queue.len();
        while !self.closed {
            match self.transport.poll_event() {
                Ok(Some(xevent)) => self.process_xevent(&xevent),
                Ok(None) => break,
                Err(e) => {
                    self.transport_failed(&e);
                    return Err(e);
                },
            }
        }
        Ok(self.queue.len().saturating_sub(before))
    }

    /// Run one wire event through the filters and translators, queueing the
    /// toolkit event it produces
    pub fn process_xevent(&mut self, xevent: &XEvent) {
        if let XEventKind::Error(error) = &xevent.kind {
            self.handle_error(error);
            return;
        }

        let target = self.event_target(xevent);
        let per_window = self.dispatched_by_window(xevent);

        let mut event = Event::new(EventKind::Nothing, target);
        event.send_event = xevent.send_event;
        event.serial = xevent.serial;

        let translated = match self.run_filters(xevent, &mut event, per_window) {
            FilterReturn::Remove => None,
            FilterReturn::Translate => Some(event),
            FilterReturn::Continue => self.run_translators(xevent).map(|mut event| {
                event.send_event = xevent.send_event;
                event.serial = xevent.serial;
                event
            }),
        };

        match translated {
            Some(event) => {
                log::trace!("serial {}: {} on {:?}", event.serial, event.kind, event.window);
                self.queue.push_back(event);
            },
            None => log::trace!("serial {}: dropped {:?}", xevent.serial, xevent.kind),
        }

        self.reap_dead_windows();
    }

    /// Core events and events of registered extensions go to the filters of
    /// their window
    fn dispatched_by_window(&self, xevent: &XEvent) -> bool {
        match xevent.kind {
            XEventKind::Unknown(code, _) => self.event_types.contains(code),
            _ => true,
        }
    }

    /// Forget windows whose `DestroyNotify` has been dispatched
    fn reap_dead_windows(&mut self) {
        for id in std::mem::take(&mut self.dead_windows) {
            if let Some(record) = self.windows.remove(id) {
                log::debug!("forgetting destroyed window 0x{:x}", record.xid);
                self.selections.forget_window(record.xid);
            }
            self.filters.prune_window(id);
        }
    }

    /// Follow the secondary connections the client library opened or closed
    fn watch_connections(&mut self) {
        for change in self.transport.take_connection_changes() {
            self.watch.apply(change);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        core::{Window, WindowKind},
        display::Display,
        event::{Event, EventKind},
        geometry::Rectangle,
        protocols::FilterReturn,
        testing::{self, FakeTransport},
        window::WindowId,
        x::{
            atoms::KnownAtom,
            event::{ClientMessageEvent, ConfigureEvent, XEvent, XEventKind},
            transport::ConnectionChange,
        },
    };

    fn toplevel(fake: &FakeTransport, display: &mut Display) -> (WindowId, Window) {
        let id = display
            .create_window(WindowKind::Toplevel, None, Rectangle::new(0, 0, 100, 100))
            .expect("window created");
        fake.server().clear_requests();
        let xid = display.windows.get(id).map(|r| r.xid).unwrap_or_default();
        (id, xid)
    }

    fn drain(display: &mut Display) -> Vec<Event> {
        std::iter::from_fn(|| display.next_event()).collect()
    }

    fn message(window: Window, type_: u32, data: [u32; 5]) -> XEventKind {
        XEventKind::ClientMessage(ClientMessageEvent::new(window, type_, data))
    }

    #[test]
    fn events_keep_serial_and_order() {
        let fake = FakeTransport::new();
        let mut display = testing::open_with(&fake);
        let (id, xid) = toplevel(&fake, &mut display);

        {
            let mut server = fake.server();
            server.push_event(XEvent::new(40, XEventKind::MapNotify(xid, xid)));
            let mut sent = XEvent::new(41, XEventKind::UnmapNotify(xid, xid));
            sent.send_event = true;
            server.push_event(sent);
        }

        assert_eq!(display.dispatch(0).expect("dispatched"), 2);
        let events = drain(&mut display);
        assert_eq!(
            events.iter().map(|e| (&e.kind, e.serial, e.send_event)).collect::<Vec<_>>(),
            vec![(&EventKind::Map, 40, false), (&EventKind::Unmap, 41, true)]
        );
        assert!(events.iter().all(|e| e.window == Some(id)));
    }

    #[test]
    fn errors_are_routed_to_traps() {
        let fake = FakeTransport::new();
        let mut display = testing::open_with(&fake);
        fake.server().fail_next(|r| matches!(r, testing::Request::Bell(_)), 8);

        display.error_trap_push();
        display.beep().expect("bell");
        display.error_trap_pop_ignored();

        assert_eq!(display.queue_pending().expect("queued"), 0);
        assert!(!display.is_closed());
    }

    #[test]
    fn destroyed_windows_are_forgotten_after_dispatch() {
        let fake = FakeTransport::new();
        let mut display = testing::open_with(&fake);
        let (id, xid) = toplevel(&fake, &mut display);
        display.add_filter(
            Some(id),
            Box::new(|_: &mut Display, _: &XEvent, _: &mut Event| FilterReturn::Continue),
        );
        let filters = display.filters.len();

        fake.server()
            .push_event(XEvent::new(50, XEventKind::DestroyNotify(xid, xid)));
        display.queue_pending().expect("queued");

        let events = drain(&mut display);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Destroy);
        assert_eq!(events[0].window, Some(id));
        assert!(display.lookup_window(xid).is_none());
        assert!(display.dead_windows.is_empty());
        assert_eq!(display.filters.len(), filters - 1);
    }

    #[test]
    fn filters_can_swallow_events() {
        let fake = FakeTransport::new();
        let mut display = testing::open_with(&fake);
        let (id, xid) = toplevel(&fake, &mut display);
        display.add_filter(
            Some(id),
            Box::new(|_: &mut Display, x: &XEvent, _: &mut Event| {
                if matches!(x.kind, XEventKind::MapNotify(..)) {
                    FilterReturn::Remove
                } else {
                    FilterReturn::Continue
                }
            }),
        );

        {
            let mut server = fake.server();
            server.push_event(XEvent::new(60, XEventKind::MapNotify(xid, xid)));
            server.push_event(XEvent::new(61, XEventKind::UnmapNotify(xid, xid)));
        }
        display.queue_pending().expect("queued");

        let kinds = drain(&mut display).into_iter().map(|e| e.kind).collect::<Vec<_>>();
        assert_eq!(kinds, vec![EventKind::Unmap]);
    }

    #[test]
    fn unregistered_extension_events_skip_window_filters() {
        let fake = FakeTransport::new();
        let display = testing::open_with(&fake);
        assert!(!display.dispatched_by_window(&XEvent::new(1, XEventKind::Unknown(120, Some(5)))));
        assert!(display.dispatched_by_window(&XEvent::new(1, XEventKind::Unknown(2, Some(5)))));
        assert!(display.dispatched_by_window(&XEvent::new(1, XEventKind::MappingNotify)));
    }

    #[test]
    fn connection_changes_are_watched() {
        let fake = FakeTransport::new();
        let mut display = testing::open_with(&fake);

        {
            let mut server = fake.server();
            server.connection_changes = vec![ConnectionChange::Opened(41)];
            server.push_event(XEvent::new(70, XEventKind::MappingNotify));
        }
        display.dispatch(0).expect("dispatched");
        assert_eq!(display.watch.internal().len(), 1);

        fake.server().connection_changes = vec![ConnectionChange::Closed(41)];
        fake.server().push_event(XEvent::new(71, XEventKind::MappingNotify));
        display.dispatch(0).expect("dispatched");
        assert!(display.watch.internal().is_empty());
        assert_eq!(display.keymap().generation(), 2);
    }

    #[test]
    fn closed_display_dispatches_nothing() {
        let fake = FakeTransport::new();
        let mut display = testing::open_with(&fake);
        display.close();
        fake.server().push_event(XEvent::new(80, XEventKind::MappingNotify));
        assert_eq!(display.dispatch(0).expect("dispatched"), 0);
        assert_eq!(display.queue_pending().expect("queued"), 0);
    }

    /// A window manager asks for a sync, resizes the window, and reports the
    /// frame drawn and presented
    #[test]
    fn sync_request_to_frame_timings() {
        let fake = FakeTransport::new();
        {
            let mut server = fake.server();
            server.extensions = testing::all_extensions();
            server.install_wm(0x500, "Testwm", &["_NET_WM_FRAME_DRAWN"]);
            server.server_time_ms = (testing::fake_clock() / 1000) as u32;
        }
        let mut display = testing::open_with(&fake);
        let (id, xid) = toplevel(&fake, &mut display);
        display.show(id).expect("shown");

        let atom = |display: &Display, known| display.atoms().get(known);
        let protocols = atom(&display, KnownAtom::WmProtocols);
        let sync_request = atom(&display, KnownAtom::NetWmSyncRequest);
        let frame_drawn = atom(&display, KnownAtom::NetWmFrameDrawn);
        let frame_timings = atom(&display, KnownAtom::NetWmFrameTimings);

        {
            let mut server = fake.server();
            server.push_event(XEvent::new(100, XEventKind::MapNotify(xid, xid)));
            server.push_event(XEvent::new(
                101,
                message(xid, protocols, [sync_request, 5, 10, 0, 1]),
            ));
            server.push_event(XEvent::new(
                102,
                XEventKind::ConfigureNotify(ConfigureEvent {
                    event: xid,
                    window: xid,
                    geometry: Rectangle::new(0, 0, 200, 150),
                    border_width: 0,
                    override_redirect: false,
                }),
            ));
        }
        display.queue_pending().expect("queued");

        let kinds = drain(&mut display).into_iter().map(|e| e.kind).collect::<Vec<_>>();
        assert!(kinds.contains(&EventKind::Map));
        assert!(kinds.contains(&EventKind::Configure {
            x:      0,
            y:      0,
            width:  200,
            height: 150,
        }));
        let toplevel = display.windows.toplevel(id).cloned().unwrap_or_default();
        assert_eq!(toplevel.configure_counter_value, 10);
        assert_eq!(toplevel.pending_counter_value, 0);

        // draw one frame: the counter goes odd, then lands on the requested value
        assert!(display.begin_frame(id).expect("frame begun"));
        display.end_frame(id).expect("frame ended");
        let toplevel = display.windows.toplevel(id).cloned().unwrap_or_default();
        assert_eq!(toplevel.current_counter_value, 10);
        assert!(toplevel.frame_pending);
        assert!(!display.begin_frame(id).expect("frozen"));

        let drawn = testing::fake_clock();
        {
            let mut server = fake.server();
            server.push_event(XEvent::new(
                103,
                message(xid, frame_drawn, [10, 0, drawn as u32, (drawn >> 32) as u32, 0]),
            ));
            server.push_event(XEvent::new(
                104,
                message(xid, frame_timings, [10, 0, 4000, 16_667, 0]),
            ));
        }
        assert_eq!(display.queue_pending().expect("queued"), 0);

        let toplevel = display.windows.toplevel(id).cloned().unwrap_or_default();
        assert!(!toplevel.frame_pending);
        let timings = toplevel.frame_clock.timings(1).copied().unwrap_or_default();
        assert_eq!(timings.cookie, 10);
        assert_eq!(timings.drawn_time, drawn);
        assert_eq!(timings.presentation_time, drawn + 4000);
        assert_eq!(timings.refresh_interval, 16_667);
        assert!(timings.complete);

        assert!(display.begin_frame(id).expect("thawed"));
    }
}
