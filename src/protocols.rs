//! Event filters and the window-manager protocol handler.
//!
//! Filters see every wire event before the translators. A filter can leave
//! the event alone, claim it with the toolkit event it filled in, or swallow
//! it. Global filters run first, then the filters attached to the window the
//! event is for.

use crate::{
    core::{FilterHandle, Timestamp},
    display::Display,
    event::{Event, EventKind},
    window::WindowId,
    x::{
        atoms::KnownAtom,
        event::{ClientMessageEvent, XEvent, XEventKind},
    },
};
use std::{collections::HashSet, fmt, mem};
use x11rb::protocol::xproto::EventMask;

/// What a filter decided about an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReturn {
    /// Not interested, keep going
    Continue,
    /// The filter filled in the toolkit event; deliver it
    Translate,
    /// Drop the event
    Remove,
}

/// Something that looks at wire events before they are translated
pub trait Filter {
    /// Inspect `xevent`. `event` is pre-filled with the target window and may
    /// be completed by returning [`FilterReturn::Translate`].
    fn filter(&mut self, display: &mut Display, xevent: &XEvent, event: &mut Event)
        -> FilterReturn;
}

impl<F> Filter for F
where
    F: FnMut(&mut Display, &XEvent, &mut Event) -> FilterReturn,
{
    fn filter(
        &mut self,
        display: &mut Display,
        xevent: &XEvent,
        event: &mut Event,
    ) -> FilterReturn {
        self(display, xevent, event)
    }
}

struct FilterEntry {
    handle: FilterHandle,
    /// `None` for global filters
    window: Option<WindowId>,
    filter: Box<dyn Filter>,
}

/// Filters installed on a display
#[derive(Default)]
pub struct FilterChain {
    entries: Vec<FilterEntry>,
    live:    HashSet<FilterHandle>,
    next:    u64,
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.live.len())
            .finish()
    }
}

impl FilterChain {
    /// Create an empty chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, window: Option<WindowId>, filter: Box<dyn Filter>) -> FilterHandle {
        self.next += 1;
        let handle = FilterHandle(self.next);
        self.entries.push(FilterEntry {
            handle,
            window,
            filter,
        });
        self.live.insert(handle);
        handle
    }

    /// Append a filter that sees every event
    pub fn add_global(&mut self, filter: Box<dyn Filter>) -> FilterHandle {
        self.add(None, filter)
    }

    /// Remove a filter. Safe to call from inside a running filter.
    pub fn remove(&mut self, handle: FilterHandle) -> bool {
        if !self.live.remove(&handle) {
            return false;
        }
        self.entries.retain(|e| e.handle != handle);
        true
    }

    /// Drop the filters attached to `window`
    pub fn prune_window(&mut self, window: WindowId) {
        let live = &mut self.live;
        self.entries.retain(|e| {
            let keep = e.window != Some(window);
            if !keep {
                live.remove(&e.handle);
            }
            keep
        });
    }

    /// Number of installed filters
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns `true` if no filter is installed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    fn is_live(&self, handle: FilterHandle) -> bool {
        self.live.contains(&handle)
    }

    fn detach(&mut self) -> Vec<FilterEntry> {
        mem::take(&mut self.entries)
    }

    /// Put detached entries back in front of filters added meanwhile,
    /// dropping the ones removed meanwhile
    fn reattach(&mut self, entries: Vec<FilterEntry>) {
        let added = mem::replace(&mut self.entries, entries);
        self.entries.extend(added);
        let live = &self.live;
        self.entries.retain(|e| live.contains(&e.handle));
    }
}

impl Display {
    /// Install a filter, global when `window` is `None`
    pub fn add_filter(&mut self, window: Option<WindowId>, filter: Box<dyn Filter>) -> FilterHandle {
        self.filters.add(window, filter)
    }

    /// Remove a filter installed with [`add_filter`](Self::add_filter)
    pub fn remove_filter(&mut self, handle: FilterHandle) -> bool {
        self.filters.remove(handle)
    }

    /// Run the global filters, then the filters of `event.window` when the
    /// event is dispatched by window
    pub(crate) fn run_filters(
        &mut self,
        xevent: &XEvent,
        event: &mut Event,
        per_window: bool,
    ) -> FilterReturn {
        let mut entries = self.filters.detach();
        let window = event.window;

        let order = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.window.is_none())
            .chain(
                entries
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| per_window && window.is_some() && e.window == window),
            )
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        let mut result = FilterReturn::Continue;
        for i in order {
            let entry = &mut entries[i];
            if !self.filters.is_live(entry.handle) {
                continue;
            }
            result = entry.filter.filter(self, xevent, event);
            if result != FilterReturn::Continue {
                break;
            }
        }

        self.filters.reattach(entries);
        result
    }
}

// ========================= WmProtocolsFilter ======================== [[[

/// Handles the client messages the window manager sends to toplevels:
/// `WM_PROTOCOLS` (delete, take focus, ping, sync request) and the frame
/// drawn/timings reports
#[derive(Debug, Clone, Copy, Default)]
pub struct WmProtocolsFilter;

/// Combine the two halves of a 64-bit value sent as two 32-bit fields
fn join(low: u32, high: u32) -> u64 {
    u64::from(low) | (u64::from(high) << 32)
}

impl Filter for WmProtocolsFilter {
    fn filter(
        &mut self,
        display: &mut Display,
        xevent: &XEvent,
        event: &mut Event,
    ) -> FilterReturn {
        let message = match &xevent.kind {
            XEventKind::ClientMessage(message) => *message,
            _ => return FilterReturn::Continue,
        };
        let id = match event.window {
            Some(id) => id,
            None => return FilterReturn::Continue,
        };
        if display.windows.get(id).map_or(true, |r| r.destroyed) {
            return FilterReturn::Continue;
        }

        let atom = |known| display.atoms.get(known);
        if message.type_ == atom(KnownAtom::NetWmFrameDrawn) {
            return frame_drawn(display, id, &message);
        }
        if message.type_ == atom(KnownAtom::NetWmFrameTimings) {
            return frame_timings(display, id, &message);
        }
        if message.type_ != atom(KnownAtom::WmProtocols) {
            return FilterReturn::Continue;
        }

        let data = message.data32();
        let protocol = data[0];
        let (delete, take_focus_atom, ping, sync_request) = (
            atom(KnownAtom::WmDeleteWindow),
            atom(KnownAtom::WmTakeFocus),
            atom(KnownAtom::NetWmPing),
            atom(KnownAtom::NetWmSyncRequest),
        );

        if protocol == delete {
            event.kind = EventKind::Delete;
            if let Err(e) = display.set_user_time(id, data[1]) {
                display.transport_failed(&e);
            }
            FilterReturn::Translate
        } else if protocol == take_focus_atom {
            take_focus(display, id, data[1]);
            FilterReturn::Remove
        } else if protocol == ping && !display.is_root_window(message.window) {
            let root = display.screen.root;
            let reply = ClientMessageEvent { window: root, ..message };
            let result = display.transport.send_client_message(
                root,
                false,
                EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
                reply,
            );
            display.absorb(result);
            FilterReturn::Remove
        } else if protocol == sync_request && display.use_sync {
            if let Some(toplevel) = display.windows.toplevel_mut(id) {
                toplevel.pending_counter_value = join(data[2], data[3]) as i64;
                toplevel.pending_counter_value_is_extended = data[4] != 0;
                log::trace!("sync request for {}", toplevel.pending_counter_value);
            }
            FilterReturn::Remove
        } else {
            FilterReturn::Continue
        }
    }
}

fn take_focus(display: &mut Display, id: WindowId, time: Timestamp) {
    let focus_window = match display.windows.get(id) {
        Some(record) if record.accept_focus => match record.toplevel.as_ref() {
            Some(toplevel) => toplevel.focus_window,
            None => return,
        },
        _ => return,
    };

    let mut trap = display.error_trap();
    let result = trap.transport.set_input_focus(focus_window, time);
    trap.absorb(result);
}

/// The window manager finished drawing a frame
fn frame_drawn(display: &mut Display, id: WindowId, message: &ClientMessageEvent) -> FilterReturn {
    let data = message.data32();
    let cookie = join(data[0], data[1]);
    let drawn = display.server_time_to_monotonic(join(data[2], data[3]) as i64);

    if let Some(toplevel) = display.windows.toplevel_mut(id) {
        if let Some(timings) = toplevel.frame_clock.find_by_cookie_mut(cookie) {
            timings.drawn_time = drawn;
        }

        if toplevel.frame_pending {
            toplevel.frame_pending = false;
            toplevel.frame_clock.thaw();
        }

        let (interval, presentation) = toplevel.frame_clock.refresh_info(drawn);
        if presentation != 0 {
            toplevel.throttled_presentation_time = presentation + interval;
        }
    }

    FilterReturn::Remove
}

/// The window manager reports when a frame reached the screen
fn frame_timings(
    display: &mut Display,
    id: WindowId,
    message: &ClientMessageEvent,
) -> FilterReturn {
    let data = message.data32();
    let cookie = join(data[0], data[1]);

    if let Some(timings) = display
        .windows
        .toplevel_mut(id)
        .and_then(|t| t.frame_clock.find_by_cookie_mut(cookie))
    {
        let offset = data[2] as i32;
        let interval = data[3] as i32;

        if timings.drawn_time != 0 && offset != 0 {
            timings.presentation_time = timings.drawn_time + i64::from(offset);
        }
        if interval != 0 {
            timings.refresh_interval = i64::from(interval);
        }
        timings.complete = true;
    }

    FilterReturn::Remove
}

// ]]] === WmProtocolsFilter ===
