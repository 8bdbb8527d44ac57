//! The core event translator: maps core and extension wire events to toolkit
//! events and keeps window records in sync with the server on the way.

use crate::{
    core::{serial_is_at_or_after, Atom, Serial, Window, WindowKind, NONE},
    display::Display,
    event::{Event, EventKind, EventMask, PropertyState},
    geometry::{Dimension, Point, Rectangle},
    toplevel::{
        is_all_desktops,
        shift_edge_constraints,
        state_changes,
        StateSupport,
        WindowState,
        WmStateFlags,
    },
    translator::EventTranslator,
    window::{Lookup, WindowId},
    x::{
        atoms::KnownAtom,
        event::{ConfigureEvent, DamageEvent, SelectionEvent, XEvent, XEventKind},
        property::PropertyValue,
    },
};
use x11rb::protocol::xproto::{self, AtomEnum};

/// Toolkit event masks and the core event masks that produce them
const EVENT_MASK_TABLE: [(EventMask, xproto::EventMask); 14] = [
    (EventMask::EXPOSURE, xproto::EventMask::EXPOSURE),
    (EventMask::POINTER_MOTION, xproto::EventMask::POINTER_MOTION),
    (EventMask::BUTTON_PRESS, xproto::EventMask::BUTTON_PRESS),
    (EventMask::BUTTON_RELEASE, xproto::EventMask::BUTTON_RELEASE),
    (EventMask::KEY_PRESS, xproto::EventMask::KEY_PRESS),
    (EventMask::KEY_RELEASE, xproto::EventMask::KEY_RELEASE),
    (EventMask::ENTER_NOTIFY, xproto::EventMask::ENTER_WINDOW),
    (EventMask::LEAVE_NOTIFY, xproto::EventMask::LEAVE_WINDOW),
    (EventMask::FOCUS_CHANGE, xproto::EventMask::FOCUS_CHANGE),
    (EventMask::STRUCTURE, xproto::EventMask::STRUCTURE_NOTIFY),
    (EventMask::PROPERTY_CHANGE, xproto::EventMask::PROPERTY_CHANGE),
    (EventMask::VISIBILITY_NOTIFY, xproto::EventMask::VISIBILITY_CHANGE),
    (EventMask::SUBSTRUCTURE, xproto::EventMask::SUBSTRUCTURE_NOTIFY),
    (EventMask::SCROLL, xproto::EventMask::BUTTON_PRESS),
];

/// The core X event mask to select for `mask` on a window
#[must_use]
pub fn x_event_mask(mask: EventMask, is_root: bool) -> xproto::EventMask {
    let base = if is_root {
        xproto::EventMask::NO_EVENT
    } else {
        xproto::EventMask::STRUCTURE_NOTIFY | xproto::EventMask::PROPERTY_CHANGE
    };

    EVENT_MASK_TABLE
        .iter()
        .filter(|(toolkit, _)| mask.contains(*toolkit))
        .fold(base, |acc, (toolkit, x)| {
            if *toolkit == EventMask::SCROLL {
                acc | *x | xproto::EventMask::BUTTON_RELEASE
            } else {
                acc | *x
            }
        })
}

/// Translates the core protocol and the RandR, XFIXES, DAMAGE and XKB events
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreTranslator;

impl CoreTranslator {
    /// Create the translator
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EventTranslator for CoreTranslator {
    fn name(&self) -> &'static str {
        "core"
    }

    fn translate_event(&mut self, display: &mut Display, xevent: &XEvent) -> Option<Event> {
        let target = xevent.target_window();
        let is_substructure = xevent.is_substructure();

        let window = match target.map(|xid| display.windows.lookup(xid)) {
            Some(Lookup::Pixmap) => return None,
            Some(Lookup::Window(id)) => Some(id),
            _ => None,
        };
        let destroyed = window
            .and_then(|id| display.windows.get(id))
            .map_or(false, |r| r.destroyed);

        if destroyed && !matches!(xevent.kind, XEventKind::DestroyNotify(..)) {
            return None;
        }

        if let XEventKind::DestroyNotify(..) = xevent.kind {
            if !is_substructure && target.is_some() && target == display.screen.wm_check_window()
            {
                log::debug!("window manager check window destroyed");
                display.screen.wm_check_destroyed();
                return None;
            }
        }

        let event = |kind: EventKind| Some(Event::new(kind, window));

        match &xevent.kind {
            XEventKind::Expose(e) | XEventKind::GraphicsExpose(e) => {
                let id = window?;
                let scale = display.windows.get(id)?.scale;
                display.process_expose(id, xevent.serial, e.area.scale_down_covering(scale), e.count);
                None
            },
            XEventKind::VisibilityNotify(_, visibility) => {
                window?;
                event(EventKind::Visibility(*visibility))
            },
            XEventKind::DestroyNotify(..) => {
                if is_substructure {
                    return None;
                }
                let id = window?;
                let root = display.screen.root;
                let record = display.windows.get_mut(id)?;
                let emit = !record.destroyed;

                if record.xid != root {
                    record.destroyed = true;
                    display.dead_windows.push(id);
                }
                emit.then(|| Event::new(EventKind::Destroy, Some(id)))
            },
            XEventKind::UnmapNotify(..) => {
                if let (Some(id), false) = (window, is_substructure) {
                    unmapped(display, id);
                }
                event(EventKind::Unmap)
            },
            XEventKind::MapNotify(..) => {
                if let (Some(id), false) = (window, is_substructure) {
                    mapped(display, id);
                }
                event(EventKind::Map)
            },
            XEventKind::ConfigureNotify(e) => configure(display, window, xevent, e, is_substructure),
            XEventKind::PropertyNotify(e) => {
                let id = window?;
                let record = display.windows.get(id)?;

                if record.kind == WindowKind::Toplevel && serial_is_at_or_after(xevent.serial, record.map_serial()) {
                    if e.atom == display.atoms.get(KnownAtom::NetWmState) {
                        display.check_wm_state_changed(id);
                    } else if e.atom == display.atoms.get(KnownAtom::NetWmDesktop) {
                        display.check_wm_desktop_changed(id);
                    } else if e.atom == display.atoms.get(KnownAtom::EdgeConstraints) {
                        display.check_edge_constraints_changed(id);
                    }
                }

                let wanted = display
                    .windows
                    .get(id)
                    .map_or(false, |r| r.event_mask.contains(EventMask::PROPERTY_CHANGE));
                wanted.then(|| {
                    Event::new(
                        EventKind::Property {
                            atom:  e.atom,
                            time:  e.time,
                            state: if e.deleted {
                                PropertyState::Delete
                            } else {
                                PropertyState::NewValue
                            },
                        },
                        Some(id),
                    )
                })
            },
            XEventKind::SelectionClear(e) => {
                if !display.selections.filter_clear(e, xevent.serial) {
                    return None;
                }
                event(EventKind::SelectionClear {
                    selection: e.selection,
                    time:      e.time,
                })
            },
            XEventKind::SelectionRequest(e) => {
                let requestor = (e.requestor != NONE).then(|| display.register_foreign(e.requestor));
                event(EventKind::SelectionRequest {
                    selection: e.selection,
                    target: e.target,
                    property: selection_property(e),
                    requestor,
                    time: e.time,
                })
            },
            XEventKind::SelectionNotify(e) => event(EventKind::SelectionNotify {
                selection: e.selection,
                target:    e.target,
                property:  selection_property(e),
                time:      e.time,
            }),
            XEventKind::MappingNotify => {
                display.keymap.keys_changed();
                None
            },
            XEventKind::SelectionOwnerNotify(e) => {
                display.process_owner_change(e);
                let owner = (e.owner != NONE).then(|| display.register_foreign(e.owner));
                event(EventKind::OwnerChange {
                    owner,
                    reason: e.reason,
                    selection: e.selection,
                    time: e.time,
                    selection_time: e.selection_time,
                })
            },
            XEventKind::RandrScreenChange(_, size) => {
                let root = display.screen.root_id;
                resize_root(display, root, *size);
                display.screen_size_changed();
                None
            },
            XEventKind::RandrNotify => {
                display.screen_size_changed();
                None
            },
            XEventKind::DamageNotify(e) => {
                damaged(display, window?, e, xevent.serial);
                None
            },
            XEventKind::XkbNewKeyboard | XEventKind::XkbMap => {
                display.keymap.keys_changed();
                None
            },
            XEventKind::XkbState(e) => {
                display.keymap.state_changed(e.mods, e.group);
                None
            },
            _ => None,
        }
    }

    fn handled_events(&self) -> EventMask {
        EventMask::STRUCTURE
            | EventMask::PROPERTY_CHANGE
            | EventMask::EXPOSURE
            | EventMask::VISIBILITY_NOTIFY
            | EventMask::SUBSTRUCTURE
    }

    fn select_window_events(
        &mut self,
        display: &mut Display,
        window: Window,
        mask: EventMask,
    ) -> crate::error::Result<()> {
        let x_mask = x_event_mask(mask, window == display.screen.root);
        log::trace!("selecting {:?} on 0x{:x}", x_mask, window);
        display.transport.select_input(window, x_mask)
    }

    fn window(&self, display: &Display, xevent: &XEvent) -> Option<WindowId> {
        xevent.target_window().and_then(|xid| display.windows.find(xid))
    }
}

/// `NONE` as the property of a selection event means "the target"
const fn selection_property(e: &SelectionEvent) -> Atom {
    if e.property == NONE {
        e.target
    } else {
        e.property
    }
}

fn unmapped(display: &mut Display, id: WindowId) {
    if !display.supports_hint(KnownAtom::NetWmStateHidden)
        && display.windows.get(id).map_or(false, |r| r.is_mapped())
    {
        display.synthesize_window_state(
            id,
            WindowState::empty(),
            WindowState::ICONIFIED,
        );
    }

    let record = match display.windows.get_mut(id) {
        Some(record) => record,
        None => return,
    };
    if let Some(toplevel) = record.toplevel.as_mut() {
        if toplevel.frame_pending {
            toplevel.frame_pending = false;
            toplevel.frame_clock.thaw();
        }
    }
    if record.toplevel.is_some() {
        display.freeze_toplevel_updates(id);
    }
}

fn mapped(display: &mut Display, id: WindowId) {
    let (iconified, is_toplevel) = match display.windows.get(id) {
        Some(r) => (r.state.contains(WindowState::ICONIFIED), r.toplevel.is_some()),
        None => return,
    };

    if iconified {
        display.synthesize_window_state(
            id,
            WindowState::ICONIFIED,
            WindowState::empty(),
        );
    }
    if is_toplevel {
        display.thaw_toplevel_updates(id);
    }
}

fn resize_root(display: &mut Display, root: WindowId, unscaled: Dimension) {
    if let Some(record) = display.windows.get_mut(root) {
        record.unscaled_size = unscaled;
        record.size = unscaled.scale_down(record.scale);
    }
}

fn configure(
    display: &mut Display,
    window: Option<WindowId>,
    xevent: &XEvent,
    e: &ConfigureEvent,
    is_substructure: bool,
) -> Option<Event> {
    let id = window?;
    let record = display.windows.get(id)?;
    let kind = record.kind;
    let unscaled = Dimension::new(e.geometry.width(), e.geometry.height());

    if kind == WindowKind::Root {
        resize_root(display, id, unscaled);
        display.screen_size_changed();
    }

    if !is_substructure && kind == WindowKind::Toplevel && display.use_sync {
        if let Some(toplevel) = display.windows.toplevel_mut(id) {
            if toplevel.pending_counter_value != 0 {
                toplevel.configure_counter_value = toplevel.pending_counter_value;
                toplevel.configure_counter_value_is_extended =
                    toplevel.pending_counter_value_is_extended;
                toplevel.pending_counter_value = 0;
            }
        }
    }

    if is_substructure || matches!(kind, WindowKind::Child | WindowKind::Root) {
        return None;
    }

    let record = display.windows.get(id)?;
    let (xid, scale, destroyed) = (record.xid, record.scale, record.destroyed);
    let size = unscaled.scale_down(scale);

    let position = if !xevent.send_event && !e.override_redirect && !destroyed {
        let root = display.screen.root;
        display
            .trapped_request(|t| t.translate_coordinates(xid, root, 0, 0))
            .map_or_else(Point::default, |(x, y)| Point::new(x / scale, y / scale))
    } else {
        Point::new(e.geometry.x() / scale, e.geometry.y() / scale)
    };

    let record = display.windows.get_mut(id)?;
    record.position = position;
    if record.unscaled_size != unscaled {
        record.unscaled_size = unscaled;
        record.size = size;
    }
    if record.resize_count >= 1 {
        record.resize_count -= 1;
        if record.resize_count == 0 {
            log::debug!("move/resize of 0x{:x} finished", xid);
        }
    }

    Some(Event::new(
        EventKind::Configure {
            x:      position.x,
            y:      position.y,
            width:  size.width,
            height: size.height,
        },
        Some(id),
    ))
}

/// A composited child was drawn to; repaint the covered part of its parent
fn damaged(display: &mut Display, id: WindowId, e: &DamageEvent, serial: Serial) {
    let record = match display.windows.get(id) {
        Some(r) if r.composited && r.damage == Some(e.damage) => r,
        _ => return,
    };
    let rect = Rectangle::damage_in_parent(record.position, e.area, record.scale);
    let parent = record.parent;

    let result = display.transport.damage_subtract(e.damage, e.area);
    display.absorb(result);

    if let Some(parent) = parent {
        display.process_expose(parent, serial, rect, 0);
    }
}

// =========================== State checks =========================== [[[

impl Display {
    fn read_toplevel_property(&mut self, id: WindowId, property: KnownAtom, type_: AtomEnum)
        -> Option<PropertyValue> {
        let xid = self.windows.get(id)?.xid;
        let atom = self.atoms.get(property);
        let reply = self.trapped_request(|t| t.get_property(xid, atom, type_.into()))?;
        PropertyValue::decode(&self.atoms, atom, reply)
    }

    /// `_NET_WM_STATE` changed on toplevel `id`
    pub(crate) fn check_wm_state_changed(&mut self, id: WindowId) {
        let flags = match self.read_toplevel_property(id, KnownAtom::NetWmState, AtomEnum::ATOM) {
            Some(PropertyValue::WmState(list)) => WmStateFlags::from_atoms(&self.atoms, &list),
            _ => WmStateFlags::default(),
        };

        let had_sticky = match self.windows.toplevel_mut(id) {
            Some(toplevel) => {
                let had_sticky = toplevel.wm_state.sticky;
                toplevel.wm_state = flags;
                had_sticky
            },
            None => return,
        };

        // Sticky only counts together with "all desktops"
        if flags.sticky && !had_sticky {
            self.check_wm_desktop_changed(id);
        } else {
            self.do_net_wm_state_changes(id);
        }
    }

    /// `_NET_WM_DESKTOP` changed on toplevel `id`
    pub(crate) fn check_wm_desktop_changed(&mut self, id: WindowId) {
        let desktop =
            match self.read_toplevel_property(id, KnownAtom::NetWmDesktop, AtomEnum::CARDINAL) {
                Some(PropertyValue::WmDesktop(desktop)) => Some(desktop),
                _ => None,
            };
        if let Some(toplevel) = self.windows.toplevel_mut(id) {
            toplevel.on_all_desktops = is_all_desktops(desktop);
        }
        self.do_net_wm_state_changes(id);
    }

    /// `_CTK_EDGE_CONSTRAINTS` changed on toplevel `id`
    pub(crate) fn check_edge_constraints_changed(&mut self, id: WindowId) {
        let raw =
            match self.read_toplevel_property(id, KnownAtom::EdgeConstraints, AtomEnum::CARDINAL) {
                Some(PropertyValue::EdgeConstraints(raw)) => Some(raw),
                _ => None,
            };
        if let Some(toplevel) = self.windows.toplevel_mut(id) {
            toplevel.edge_constraints = shift_edge_constraints(raw);
        }
        self.do_net_wm_state_changes(id);
    }

    /// Publish the difference between the window's state and what the
    /// window manager's properties describe
    pub(crate) fn do_net_wm_state_changes(&mut self, id: WindowId) {
        match self.windows.get(id) {
            Some(r) if !r.destroyed && r.kind == WindowKind::Toplevel => {},
            _ => return,
        }

        let support = StateSupport {
            focused_hint: self.supports_hint(KnownAtom::NetWmStateFocused),
            edge_constraints_hint: self.supports_hint(KnownAtom::EdgeConstraints),
            tiled_fallback: self.tiled_fallback,
        };

        let record = match self.windows.get(id) {
            Some(record) => record,
            None => return,
        };
        let (unset, set) = match record.toplevel.as_ref() {
            Some(t) => state_changes(
                record.state,
                &t.wm_state,
                t.on_all_desktops,
                t.edge_constraints,
                &support,
            ),
            None => return,
        };

        self.synthesize_window_state(id, unset, set);
    }
}

// ]]] === State checks ===
