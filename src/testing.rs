//! In-memory [`Transport`] used by the unit tests.
//!
//! [`FakeTransport`] is a shared handle to a [`FakeServer`], so a test can keep
//! a clone after handing the transport to a display. Requests are numbered
//! like on a real connection and recorded. Void requests that are scripted to
//! fail queue an error event for their serial; requests with a reply return
//! the error directly.

use crate::{
    config::DisplaySettings,
    core::{Atom, Serial, Timestamp, Window, Xid, NONE},
    display::Display,
    error::{Error, Result, XError},
    geometry::Rectangle,
    x::{
        atoms::PREDEFINED,
        event::{ClientMessageEvent, XEvent, XEventKind},
        property::PropertyReply,
        transport::{
            ConnectionChange,
            ExtensionVersion,
            Extensions,
            ScreenInfo,
            Transport,
            WindowAttributes,
        },
    },
};
use std::{
    cell::{Cell, RefCell, RefMut},
    collections::{HashMap, VecDeque},
    os::unix::io::RawFd,
    rc::Rc,
};
use x11rb::protocol::xproto::{EventMask, PropMode};

/// Root window of the fake screen
pub(crate) const ROOT: Window = 0x100;

/// A request as seen by the fake server
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Request {
    InternAtoms(Vec<String>),
    AtomName(Atom),
    GetProperty {
        window:   Window,
        property: Atom,
    },
    ChangeProperty {
        window:   Window,
        property: Atom,
        type_:    Atom,
        format:   u8,
        mode:     PropMode,
        data:     Vec<u8>,
    },
    DeleteProperty {
        window:   Window,
        property: Atom,
    },
    TranslateCoordinates {
        src: Window,
        dst: Window,
    },
    SendEvent {
        destination: Window,
        propagate:   bool,
        mask:        EventMask,
        message:     ClientMessageEvent,
    },
    SetInputFocus {
        window: Window,
        time:   Timestamp,
    },
    QueryPointer(Window),
    CreateWindow {
        window:     Window,
        parent:     Window,
        geometry:   Rectangle,
        attributes: WindowAttributes,
    },
    DestroyWindow(Window),
    MapWindow(Window),
    UnmapWindow(Window),
    SelectInput {
        window: Window,
        mask:   EventMask,
    },
    SelectionOwner(Atom),
    SetSelectionOwner {
        owner:     Window,
        selection: Atom,
        time:      Timestamp,
    },
    SelectSelectionInput {
        window:    Window,
        selection: Atom,
    },
    GrabServer,
    UngrabServer,
    Bell(i8),
    ServerTime(Window),
    DamageSubtract {
        damage: Xid,
        repair: Rectangle,
    },
    CreateCounter {
        counter: Xid,
        value:   i64,
    },
    SetCounter {
        counter: Xid,
        value:   i64,
    },
    Sync,
    QueryExtensions,
}

type Matcher = Box<dyn Fn(&Request) -> bool>;

/// Scriptable stand-in for an X server
pub(crate) struct FakeServer {
    next_serial:    Serial,
    last_processed: Serial,
    synchronous:    bool,

    atoms:          HashMap<String, Atom>,
    names:          HashMap<Atom, String>,
    next_atom:      Atom,
    intern_batches: usize,

    next_window:    Window,
    properties:     HashMap<(Window, Atom), PropertyReply>,
    pointer_origin: HashMap<Window, (i32, i32)>,

    requests:       Vec<(Serial, Request)>,
    failures:       Vec<(Matcher, u8)>,
    events:         VecDeque<XEvent>,

    pub(crate) selection_owners:   HashMap<Atom, Window>,
    pub(crate) screens:            Vec<ScreenInfo>,
    pub(crate) extensions:         Extensions,
    pub(crate) server_time_ms:     Timestamp,
    pub(crate) connection_changes: Vec<ConnectionChange>,
    pub(crate) processed_fds:      Vec<RawFd>,
}

impl std::fmt::Debug for FakeServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeServer")
            .field("next_serial", &self.next_serial)
            .field("last_processed", &self.last_processed)
            .field("requests", &self.requests.len())
            .field("events", &self.events.len())
            .finish()
    }
}

impl Default for FakeServer {
    fn default() -> Self {
        let mut fake = Self {
            next_serial:        1,
            last_processed:     0,
            synchronous:        false,
            atoms:              HashMap::new(),
            names:              HashMap::new(),
            next_atom:          0x200,
            intern_batches:     0,
            next_window:        0x40_0000,
            properties:         HashMap::new(),
            pointer_origin:     HashMap::new(),
            requests:           Vec::new(),
            failures:           Vec::new(),
            events:             VecDeque::new(),
            selection_owners:   HashMap::new(),
            screens:            vec![ScreenInfo {
                root:   ROOT,
                width:  1920,
                height: 1080,
            }],
            extensions:         Extensions::default(),
            server_time_ms:     1_000,
            connection_changes: Vec::new(),
            processed_fds:      Vec::new(),
        };
        for (name, atom) in PREDEFINED {
            let atom: Atom = (*atom).into();
            fake.atoms.insert((*name).to_owned(), atom);
            fake.names.insert(atom, (*name).to_owned());
        }
        fake
    }
}

impl FakeServer {
    /// Number of `InternAtom` batches sent
    pub(crate) fn intern_batches(&self) -> usize {
        self.intern_batches
    }

    /// Atom the fake server assigned to `name`, interning it if needed
    pub(crate) fn atom(&mut self, name: &str) -> Atom {
        if let Some(atom) = self.atoms.get(name) {
            return *atom;
        }
        let atom = self.next_atom;
        self.next_atom += 1;
        self.atoms.insert(name.to_owned(), atom);
        self.names.insert(atom, name.to_owned());
        atom
    }

    /// Every request sent so far, with its serial
    pub(crate) fn requests(&self) -> &[(Serial, Request)] {
        &self.requests
    }

    /// Forget the request log
    pub(crate) fn clear_requests(&mut self) {
        self.requests.clear();
    }

    /// Set the server side value of a property
    pub(crate) fn set_property(&mut self, window: Window, property: Atom, reply: PropertyReply) {
        self.properties.insert((window, property), reply);
    }

    /// Server side value of a property
    pub(crate) fn property(&self, window: Window, property: Atom) -> Option<&PropertyReply> {
        self.properties.get(&(window, property))
    }

    /// Root coordinates of `window`'s origin, used by `TranslateCoordinates`
    pub(crate) fn set_origin(&mut self, window: Window, x: i32, y: i32) {
        self.pointer_origin.insert(window, (x, y));
    }

    /// Queue a wire event
    pub(crate) fn push_event(&mut self, event: XEvent) {
        self.events.push_back(event);
    }

    /// Make the next request matching `matcher` fail with `error_code`
    pub(crate) fn fail_next<F>(&mut self, matcher: F, error_code: u8)
    where
        F: Fn(&Request) -> bool + 'static,
    {
        self.failures.push((Box::new(matcher), error_code));
    }

    /// Publish an EWMH window manager with check window `check`
    pub(crate) fn install_wm(&mut self, check: Window, name: &str, supported: &[&str]) {
        let check_atom = self.atom("_NET_SUPPORTING_WM_CHECK");
        let window = self.atom("WINDOW");
        let utf8 = self.atom("UTF8_STRING");
        let wm_name = self.atom("_NET_WM_NAME");
        let net_supported = self.atom("_NET_SUPPORTED");
        let atom = self.atom("ATOM");
        let hints = supported.iter().map(|h| self.atom(h)).collect::<Vec<_>>();

        self.set_property(ROOT, check_atom, PropertyReply::from_u32(window, &[check]));
        self.set_property(check, check_atom, PropertyReply::from_u32(window, &[check]));
        self.set_property(check, wm_name, PropertyReply::from_string(utf8, name));
        self.set_property(ROOT, net_supported, PropertyReply::from_u32(atom, &hints));
    }

    /// Pretend the server caught up to `serial`
    pub(crate) fn set_last_processed(&mut self, serial: Serial) {
        self.last_processed = serial;
    }

    /// Skip serials, e.g. to test wraparound
    pub(crate) fn set_next_serial(&mut self, serial: Serial) {
        self.next_serial = serial;
    }

    /// Number the request and check it against the scripted failures
    fn record(&mut self, request: Request) -> (Serial, Option<XError>) {
        let serial = self.next_serial;
        self.next_serial = self.next_serial.wrapping_add(1);

        let error = self
            .failures
            .iter()
            .position(|(m, _)| m(&request))
            .map(|idx| {
                let (_, error_code) = self.failures.remove(idx);
                XError {
                    serial,
                    error_code,
                    request_code: 1,
                    minor_code: 0,
                    resource_id: 0,
                    extension: None,
                }
            });

        self.requests.push((serial, request));
        if self.synchronous {
            self.last_processed = serial;
        }
        (serial, error)
    }

    /// A request without a reply; errors arrive as events
    fn void(&mut self, request: Request) -> Result<()> {
        let (serial, error) = self.record(request);
        if let Some(error) = error {
            self.events
                .push_back(XEvent::new(serial, XEventKind::Error(error)));
        }
        Ok(())
    }

    /// A request with a reply; errors are returned
    fn reply(&mut self, request: Request) -> Result<()> {
        let (serial, error) = self.record(request);
        self.last_processed = serial;
        match error {
            Some(error) => Err(Error::Request(error)),
            None => Ok(()),
        }
    }
}

impl Transport for FakeServer {
    fn display_name(&self) -> &str {
        ":fake"
    }

    fn default_screen(&self) -> usize {
        0
    }

    fn screens(&self) -> Vec<ScreenInfo> {
        self.screens.clone()
    }

    fn raw_fd(&self) -> Option<RawFd> {
        None
    }

    fn next_request(&self) -> Serial {
        self.next_serial
    }

    fn last_processed(&self) -> Serial {
        self.last_processed
    }

    fn set_synchronous(&mut self, synchronous: bool) {
        self.synchronous = synchronous;
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.reply(Request::Sync)
    }

    fn poll_event(&mut self) -> Result<Option<XEvent>> {
        let event = self.events.pop_front();
        if let Some(ev) = &event {
            if crate::core::serial_is_before(self.last_processed, ev.serial) {
                self.last_processed = ev.serial;
            }
        }
        Ok(event)
    }

    fn has_pending(&mut self) -> Result<bool> {
        Ok(!self.events.is_empty())
    }

    fn drain_errors(&mut self) -> Result<Vec<XError>> {
        let mut errors = Vec::new();
        self.events.retain(|ev| match &ev.kind {
            XEventKind::Error(e) => {
                errors.push(e.clone());
                false
            },
            _ => true,
        });
        Ok(errors)
    }

    fn intern_atoms(&mut self, names: &[&str]) -> Result<Vec<Atom>> {
        self.intern_batches += 1;
        self.reply(Request::InternAtoms(
            names.iter().map(|n| (*n).to_owned()).collect(),
        ))?;
        Ok(names.iter().map(|n| self.atom(n)).collect())
    }

    fn atom_name(&mut self, atom: Atom) -> Result<String> {
        self.reply(Request::AtomName(atom))?;
        self.names
            .get(&atom)
            .cloned()
            .ok_or(Error::UnknownAtom(atom))
    }

    fn get_property(
        &mut self,
        window: Window,
        property: Atom,
        type_: Atom,
    ) -> Result<PropertyReply> {
        self.reply(Request::GetProperty { window, property })?;
        Ok(match self.properties.get(&(window, property)) {
            Some(reply) if type_ == NONE || reply.type_ == type_ => reply.clone(),
            Some(reply) => PropertyReply {
                type_:  reply.type_,
                format: reply.format,
                data:   Vec::new(),
            },
            None => PropertyReply {
                type_:  NONE,
                format: 0,
                data:   Vec::new(),
            },
        })
    }

    fn change_property(
        &mut self,
        window: Window,
        property: Atom,
        type_: Atom,
        format: u8,
        mode: PropMode,
        data: &[u8],
    ) -> Result<()> {
        self.properties.insert((window, property), PropertyReply {
            type_,
            format,
            data: data.to_vec(),
        });
        self.void(Request::ChangeProperty {
            window,
            property,
            type_,
            format,
            mode,
            data: data.to_vec(),
        })
    }

    fn delete_property(&mut self, window: Window, property: Atom) -> Result<()> {
        self.properties.remove(&(window, property));
        self.void(Request::DeleteProperty { window, property })
    }

    fn translate_coordinates(
        &mut self,
        src: Window,
        dst: Window,
        x: i16,
        y: i16,
    ) -> Result<(i32, i32)> {
        self.reply(Request::TranslateCoordinates { src, dst })?;
        let (ox, oy) = self.pointer_origin.get(&src).copied().unwrap_or((0, 0));
        Ok((ox + i32::from(x), oy + i32::from(y)))
    }

    fn send_client_message(
        &mut self,
        destination: Window,
        propagate: bool,
        mask: EventMask,
        message: ClientMessageEvent,
    ) -> Result<()> {
        self.void(Request::SendEvent {
            destination,
            propagate,
            mask,
            message,
        })
    }

    fn set_input_focus(&mut self, window: Window, time: Timestamp) -> Result<()> {
        self.void(Request::SetInputFocus { window, time })
    }

    fn query_pointer(&mut self, window: Window) -> Result<(i32, i32)> {
        self.reply(Request::QueryPointer(window))?;
        Ok((0, 0))
    }

    fn create_window(
        &mut self,
        parent: Window,
        geometry: Rectangle,
        attributes: WindowAttributes,
    ) -> Result<Window> {
        let window = self.next_window;
        self.next_window += 1;
        self.void(Request::CreateWindow {
            window,
            parent,
            geometry,
            attributes,
        })?;
        Ok(window)
    }

    fn destroy_window(&mut self, window: Window) -> Result<()> {
        self.void(Request::DestroyWindow(window))
    }

    fn map_window(&mut self, window: Window) -> Result<()> {
        self.void(Request::MapWindow(window))
    }

    fn unmap_window(&mut self, window: Window) -> Result<()> {
        self.void(Request::UnmapWindow(window))
    }

    fn select_input(&mut self, window: Window, mask: EventMask) -> Result<()> {
        self.void(Request::SelectInput { window, mask })
    }

    fn selection_owner(&mut self, selection: Atom) -> Result<Window> {
        self.reply(Request::SelectionOwner(selection))?;
        Ok(self.selection_owners.get(&selection).copied().unwrap_or(NONE))
    }

    fn set_selection_owner(
        &mut self,
        owner: Window,
        selection: Atom,
        time: Timestamp,
    ) -> Result<()> {
        self.void(Request::SetSelectionOwner {
            owner,
            selection,
            time,
        })?;
        self.selection_owners.insert(selection, owner);
        Ok(())
    }

    fn select_selection_input(&mut self, window: Window, selection: Atom) -> Result<()> {
        self.void(Request::SelectSelectionInput { window, selection })
    }

    fn grab_server(&mut self) -> Result<()> {
        self.void(Request::GrabServer)
    }

    fn ungrab_server(&mut self) -> Result<()> {
        self.void(Request::UngrabServer)
    }

    fn bell(&mut self, percent: i8) -> Result<()> {
        self.void(Request::Bell(percent))
    }

    fn server_time(&mut self, window: Window, _property: Atom) -> Result<Timestamp> {
        self.reply(Request::ServerTime(window))?;
        Ok(self.server_time_ms)
    }

    fn damage_subtract(&mut self, damage: Xid, repair: Rectangle) -> Result<()> {
        self.void(Request::DamageSubtract { damage, repair })
    }

    fn create_counter(&mut self, value: i64) -> Result<Xid> {
        let counter = self.next_window;
        self.next_window += 1;
        self.void(Request::CreateCounter { counter, value })?;
        Ok(counter)
    }

    fn set_counter(&mut self, counter: Xid, value: i64) -> Result<()> {
        self.void(Request::SetCounter { counter, value })
    }

    fn query_extensions(&mut self) -> Result<Extensions> {
        self.reply(Request::QueryExtensions)?;
        Ok(self.extensions)
    }

    fn process_internal_connection(&mut self, fd: RawFd) {
        self.processed_fds.push(fd);
    }

    fn take_connection_changes(&mut self) -> Vec<ConnectionChange> {
        std::mem::take(&mut self.connection_changes)
    }
}

// =========================== FakeTransport ==========================

/// Shared handle to a [`FakeServer`]
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeTransport(Rc<RefCell<FakeServer>>);

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Access the server state
    pub(crate) fn server(&self) -> RefMut<'_, FakeServer> {
        self.0.borrow_mut()
    }

    /// Number of `InternAtom` batches sent
    pub(crate) fn intern_batches(&self) -> usize {
        self.0.borrow().intern_batches()
    }
}

macro_rules! delegate {
    ($($name:ident(&mut self $(, $arg:ident: $ty:ty)*) -> $ret:ty;)*) => {
        $(
            fn $name(&mut self $(, $arg: $ty)*) -> $ret {
                self.0.borrow_mut().$name($($arg),*)
            }
        )*
    };
}

impl Transport for FakeTransport {
    fn display_name(&self) -> &str {
        ":fake"
    }

    fn default_screen(&self) -> usize {
        self.0.borrow().default_screen()
    }

    fn screens(&self) -> Vec<ScreenInfo> {
        self.0.borrow().screens()
    }

    fn raw_fd(&self) -> Option<RawFd> {
        None
    }

    fn next_request(&self) -> Serial {
        self.0.borrow().next_request()
    }

    fn last_processed(&self) -> Serial {
        self.0.borrow().last_processed()
    }

    delegate! {
        set_synchronous(&mut self, synchronous: bool) -> ();
        flush(&mut self) -> Result<()>;
        sync(&mut self) -> Result<()>;
        poll_event(&mut self) -> Result<Option<XEvent>>;
        has_pending(&mut self) -> Result<bool>;
        drain_errors(&mut self) -> Result<Vec<XError>>;
        intern_atoms(&mut self, names: &[&str]) -> Result<Vec<Atom>>;
        atom_name(&mut self, atom: Atom) -> Result<String>;
        get_property(&mut self, window: Window, property: Atom, type_: Atom) -> Result<PropertyReply>;
        change_property(
            &mut self,
            window: Window,
            property: Atom,
            type_: Atom,
            format: u8,
            mode: PropMode,
            data: &[u8]
        ) -> Result<()>;
        delete_property(&mut self, window: Window, property: Atom) -> Result<()>;
        translate_coordinates(&mut self, src: Window, dst: Window, x: i16, y: i16) -> Result<(i32, i32)>;
        send_client_message(
            &mut self,
            destination: Window,
            propagate: bool,
            mask: EventMask,
            message: ClientMessageEvent
        ) -> Result<()>;
        set_input_focus(&mut self, window: Window, time: Timestamp) -> Result<()>;
        query_pointer(&mut self, window: Window) -> Result<(i32, i32)>;
        create_window(&mut self, parent: Window, geometry: Rectangle, attributes: WindowAttributes) -> Result<Window>;
        destroy_window(&mut self, window: Window) -> Result<()>;
        map_window(&mut self, window: Window) -> Result<()>;
        unmap_window(&mut self, window: Window) -> Result<()>;
        select_input(&mut self, window: Window, mask: EventMask) -> Result<()>;
        selection_owner(&mut self, selection: Atom) -> Result<Window>;
        set_selection_owner(&mut self, owner: Window, selection: Atom, time: Timestamp) -> Result<()>;
        select_selection_input(&mut self, window: Window, selection: Atom) -> Result<()>;
        grab_server(&mut self) -> Result<()>;
        ungrab_server(&mut self) -> Result<()>;
        bell(&mut self, percent: i8) -> Result<()>;
        server_time(&mut self, window: Window, property: Atom) -> Result<Timestamp>;
        damage_subtract(&mut self, damage: Xid, repair: Rectangle) -> Result<()>;
        create_counter(&mut self, value: i64) -> Result<Xid>;
        set_counter(&mut self, counter: Xid, value: i64) -> Result<()>;
        query_extensions(&mut self) -> Result<Extensions>;
        process_internal_connection(&mut self, fd: RawFd) -> ();
        take_connection_changes(&mut self) -> Vec<ConnectionChange>;
    }
}

// ============================= Helpers ==============================

thread_local! {
    static NOW: Cell<i64> = Cell::new(100_000_000);
}

/// Monotonic clock driven by [`set_now`]
pub(crate) fn fake_clock() -> i64 {
    NOW.with(Cell::get)
}

/// Set the time reported by [`fake_clock`], in microseconds
pub(crate) fn set_now(now: i64) {
    NOW.with(|n| n.set(now));
}

/// Every extension the display knows, at versions that enable all features
pub(crate) fn all_extensions() -> Extensions {
    let version = |major_opcode, first_event, version| {
        Some(ExtensionVersion {
            major_opcode,
            first_event,
            version,
        })
    };
    Extensions {
        randr:     version(140, 89, (1, 4)),
        xfixes:    version(138, 87, (5, 0)),
        composite: version(142, 0, (0, 4)),
        damage:    version(143, 91, (1, 1)),
        shape:     version(129, 64, (1, 1)),
        xkb:       version(135, 85, (1, 0)),
        sync:      version(134, 83, (3, 1)),
    }
}

/// A protocol error for `serial`
pub(crate) fn xerror(serial: Serial, error_code: u8) -> XError {
    XError {
        serial,
        error_code,
        request_code: 1,
        minor_code: 0,
        resource_id: 0,
        extension: None,
    }
}

/// Open a display on `fake` with default settings and the fake clock
pub(crate) fn open_with(fake: &FakeTransport) -> Display {
    open_with_settings(fake, DisplaySettings::default())
}

/// Open a display on `fake` with the fake clock
pub(crate) fn open_with_settings(fake: &FakeTransport, settings: DisplaySettings) -> Display {
    let mut display =
        Display::open(Box::new(fake.clone()), settings).expect("fake display opens");
    display.set_clock(fake_clock);
    display
}
