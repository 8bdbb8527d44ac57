//! The display: one connection to the X server and everything hanging off it.
//!
//! [`Display`] is the explicit context passed to every entry point. It owns
//! the transport, the atom cache, the error-trap stack, the server-time
//! calibration, the window arena, the default screen, and the translator and
//! filter chains used by the event source.

use crate::{
    config::DisplaySettings,
    core::{Timestamp, Window, WindowKind, Xid, CURRENT_TIME, NONE, SUCCESS},
    error::{Error, Result, XError},
    error_trap::{error_description, error_diagnostic, ErrorDisposition, ErrorTrapStack},
    event::Event,
    geometry::{Dimension, Rectangle},
    keymap::Keymap,
    protocols::{FilterChain, WmProtocolsFilter},
    screen::Screen,
    selection::SelectionOwners,
    toplevel::{vertical_maximize_is_tiled, TiledFallback},
    server_time::{monotonic_time, MonotonicClock, ServerTimeOracle},
    translate::CoreTranslator,
    translator::TranslatorRegistry,
    window::{WindowId, WindowRecord, WindowStore},
    x::{
        atoms::{AtomCache, KnownAtom},
        connection::ConnectionWatch,
        event::EventTypes,
        transport::{Extensions, Transport, WindowAttributes, X11Transport},
    },
};
use std::{
    collections::VecDeque,
    ops::{Deref, DerefMut},
};
use x11rb::protocol::xproto::{AtomEnum, EventMask, PropMode};

/// Event codes claimed by each extension
const RANDR_NUMBER_EVENTS: u8 = 2;
const XFIXES_NUMBER_EVENTS: u8 = 2;
const DAMAGE_NUMBER_EVENTS: u8 = 1;
const SHAPE_NUMBER_EVENTS: u8 = 1;
const SYNC_NUMBER_EVENTS: u8 = 2;
const XKB_NUMBER_EVENTS: u8 = 1;

/// Geometry of the leader window
const LEADER_GEOMETRY: Rectangle = Rectangle::new(10, 10, 10, 10);

// ============================== Display ============================= [[[

/// A connection to an X display
pub struct Display {
    pub(crate) transport:   Box<dyn Transport>,
    pub(crate) atoms:       AtomCache,
    pub(crate) traps:       ErrorTrapStack,
    pub(crate) oracle:      ServerTimeOracle,
    pub(crate) clock:       MonotonicClock,
    pub(crate) windows:     WindowStore,
    pub(crate) screen:      Screen,
    pub(crate) extensions:  Extensions,
    pub(crate) event_types: EventTypes,
    pub(crate) translators: TranslatorRegistry,
    pub(crate) filters:     FilterChain,
    pub(crate) queue:       VecDeque<Event>,
    /// Windows whose `DestroyNotify` was translated; dropped after dispatch
    pub(crate) dead_windows: Vec<WindowId>,
    pub(crate) watch:       ConnectionWatch,
    pub(crate) keymap:      Keymap,
    pub(crate) selections:  SelectionOwners,
    /// Tiling rule for window managers without edge constraints
    pub(crate) tiled_fallback: TiledFallback,
    pub(crate) settings:    DisplaySettings,

    /// Input-only window carrying client-wide properties
    pub(crate) leader:     Window,
    pub(crate) trusted:    bool,
    pub(crate) closed:     bool,
    pub(crate) grab_count: u32,
    /// Latest user interaction time seen on any toplevel
    pub(crate) user_time:  Timestamp,
    pub(crate) startup_id: Option<String>,
    pub(crate) use_sync:   bool,
    pub(crate) use_xkb:    bool,
}

impl std::fmt::Debug for Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Display")
            .field("name", &self.transport.display_name())
            .field("screen", &self.screen)
            .field("windows", &self.windows.len())
            .field("traps", &self.traps.len())
            .field("trusted", &self.trusted)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Display {
    /// Connect to the X server named in `settings` (or `$DISPLAY`) and open
    /// its default screen
    pub fn connect(settings: DisplaySettings) -> Result<Self> {
        let transport = X11Transport::connect(settings.display.as_deref())?;
        Self::open(Box::new(transport), settings)
    }

    /// Open a display over `transport`
    pub fn open(mut transport: Box<dyn Transport>, settings: DisplaySettings) -> Result<Self> {
        let mut atoms = AtomCache::new();
        atoms.precache(transport.as_mut())?;

        let number = transport.default_screen();
        let info = transport
            .screens()
            .get(number)
            .copied()
            .ok_or(Error::NoScreen(number))?;

        let cm_selection = if number == 0 {
            atoms.get(KnownAtom::NetWmCmS0)
        } else {
            atoms.intern(transport.as_mut(), &format!("_NET_WM_CM_S{}", number))?
        };

        let fixed_scale = settings.fixed_window_scale.is_some();
        let scale = settings.fixed_window_scale.unwrap_or(1).max(1);
        let unscaled = Dimension::new(info.width, info.height);
        let size = unscaled.scale_down(scale);

        let mut windows = WindowStore::new();
        let mut root = WindowRecord::new(
            info.root,
            WindowKind::Root,
            None,
            Rectangle::new(0, 0, size.width, size.height),
            scale,
        );
        root.unscaled_size = unscaled;
        root.screen = number;
        root.viewable = true;
        let root_id = windows.insert(root);

        let screen = Screen::new(number, info.root, root_id, size, scale, fixed_scale, cm_selection);
        let watch = ConnectionWatch::new(transport.raw_fd());

        let mut display = Self {
            transport,
            atoms,
            traps: ErrorTrapStack::new(),
            oracle: ServerTimeOracle::new(),
            clock: monotonic_time,
            windows,
            screen,
            extensions: Extensions::default(),
            event_types: EventTypes::new(),
            translators: TranslatorRegistry::new(),
            filters: FilterChain::new(),
            queue: VecDeque::new(),
            dead_windows: Vec::new(),
            watch,
            keymap: Keymap::new(),
            selections: SelectionOwners::new(),
            tiled_fallback: vertical_maximize_is_tiled,
            settings,
            leader: NONE,
            trusted: true,
            closed: false,
            grab_count: 0,
            user_time: CURRENT_TIME,
            startup_id: None,
            use_sync: false,
            use_xkb: false,
        };

        display.init_extensions()?;
        display.create_leader()?;
        display.init_compositing();
        display.probe_trusted();

        if display.settings.synchronize {
            display.transport.set_synchronous(true);
        }

        display.init_leader_properties()?;
        display.user_time = CURRENT_TIME;
        display.use_xkb = display.settings.use_xkb && display.extensions.xkb.is_some();
        display.use_sync = display.settings.use_sync && display.extensions.sync.is_some();

        if let Some(id) = display.settings.startup_id.clone() {
            display.set_startup_notification_id(Some(&id))?;
        }

        display.translators.register(Box::new(CoreTranslator::new()));
        display.filters.add_global(Box::new(WmProtocolsFilter));

        log::info!(
            "opened display {} (screen {}, {}x{}, scale {})",
            display.transport.display_name(),
            number,
            info.width,
            info.height,
            scale
        );
        Ok(display)
    }

    // ============================ Initialize ========================== [[[

    /// Detect extensions and claim their event codes
    fn init_extensions(&mut self) -> Result<()> {
        let ext = self.transport.query_extensions()?;

        let claims = [
            (ext.randr, RANDR_NUMBER_EVENTS),
            (ext.xfixes, XFIXES_NUMBER_EVENTS),
            (ext.damage, DAMAGE_NUMBER_EVENTS),
            (ext.shape, SHAPE_NUMBER_EVENTS),
            (ext.sync, SYNC_NUMBER_EVENTS),
            (ext.xkb, XKB_NUMBER_EVENTS),
        ];
        for (version, count) in claims {
            if let Some(version) = version {
                self.event_types.register(version.first_event, count);
            }
        }

        self.extensions = ext;
        log::debug!(
            "randr 1.2/1.3/1.5: {}/{}/{}, composite: {}, input shapes: {}",
            self.has_randr12(),
            self.has_randr13(),
            self.has_randr15(),
            self.supports_composite(),
            self.supports_input_shapes()
        );
        Ok(())
    }

    /// Create the input-only leader toplevel
    fn create_leader(&mut self) -> Result<()> {
        let scale = self.screen.window_scale;
        let device = Rectangle::new(
            LEADER_GEOMETRY.x() * scale,
            LEADER_GEOMETRY.y() * scale,
            LEADER_GEOMETRY.width() * scale,
            LEADER_GEOMETRY.height() * scale,
        );
        let leader = self.transport.create_window(self.screen.root, device, WindowAttributes {
            override_redirect: false,
            event_mask:        EventMask::PROPERTY_CHANGE,
            input_only:        true,
        })?;

        let mut record = WindowRecord::new(
            leader,
            WindowKind::Toplevel,
            Some(self.screen.root_id),
            LEADER_GEOMETRY,
            scale,
        );
        record.screen = self.screen.number;
        self.windows.insert(record);
        self.leader = leader;
        log::debug!("leader window 0x{:x}", leader);
        Ok(())
    }

    /// A pointer query on the root fails with `BadWindow` for untrusted
    /// (security extension restricted) clients
    fn probe_trusted(&mut self) {
        let root = self.screen.root;
        let code = {
            let mut trap = self.error_trap();
            let result = trap.transport.query_pointer(root);
            trap.absorb(result);
            trap.pop_checked()
        };

        if code == crate::core::BAD_WINDOW {
            log::warn!(
                "Connection to display {} appears to be untrusted. Pointer and keyboard grabs \
                 and inter-client communication may not work as expected.",
                self.transport.display_name()
            );
            self.trusted = false;
        }
    }

    /// `WM_CLASS`, `SM_CLIENT_ID` and `_NET_WM_PID` on the leader
    fn init_leader_properties(&mut self) -> Result<()> {
        let class = format!(
            "{}\0{}\0",
            self.settings.program_name, self.settings.program_class
        );
        self.transport.change_property(
            self.leader,
            AtomEnum::WM_CLASS.into(),
            AtomEnum::STRING.into(),
            8,
            PropMode::REPLACE,
            class.as_bytes(),
        )?;

        if let Some(id) = self.settings.sm_client_id.clone() {
            self.set_sm_client_id(Some(&id))?;
        }

        if !self.settings.sandboxed {
            let pid = std::process::id();
            let atom = self.atoms.get(KnownAtom::NetWmPid);
            self.set_property32(self.leader, atom, AtomEnum::CARDINAL.into(), &[pid])?;
        }
        Ok(())
    }

    // ]]] === Initialize ===

    // ============================= Accessor =========================== [[[

    /// Name of the display
    #[must_use]
    pub fn name(&self) -> &str {
        self.transport.display_name()
    }

    /// The default screen
    #[must_use]
    pub const fn screen(&self) -> &Screen {
        &self.screen
    }

    /// The default screen, for registering observers
    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }

    /// The atom cache
    #[must_use]
    pub const fn atoms(&self) -> &AtomCache {
        &self.atoms
    }

    /// Every window the display knows about
    #[must_use]
    pub const fn windows(&self) -> &WindowStore {
        &self.windows
    }

    /// The record of a window
    #[must_use]
    pub fn window(&self, id: WindowId) -> Option<&WindowRecord> {
        self.windows.get(id)
    }

    /// The record for an X id
    #[must_use]
    pub fn lookup_window(&self, xid: Xid) -> Option<WindowId> {
        self.windows.find(xid)
    }

    /// Keyboard state
    #[must_use]
    pub const fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    /// The leader window
    #[must_use]
    pub const fn leader(&self) -> Window {
        self.leader
    }

    /// Whether the server treats this client as trusted
    #[must_use]
    pub const fn is_trusted(&self) -> bool {
        self.trusted
    }

    /// Whether the connection is gone or was closed
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Latest user interaction time, `0` if none is known
    #[must_use]
    pub const fn user_time(&self) -> Timestamp {
        self.user_time
    }

    /// Serial the next request will get
    #[must_use]
    pub fn next_serial(&self) -> u32 {
        self.transport.next_request()
    }

    /// Returns `true` if `window` is the root of the default screen
    #[must_use]
    pub fn is_root_window(&self, window: Window) -> bool {
        window == self.screen.root
    }

    /// XSync counters are used
    #[must_use]
    pub const fn uses_sync(&self) -> bool {
        self.use_sync
    }

    /// XKB is used
    #[must_use]
    pub const fn uses_xkb(&self) -> bool {
        self.use_xkb
    }

    /// Replace the source of monotonic time
    pub fn set_clock(&mut self, clock: MonotonicClock) {
        self.clock = clock;
    }

    // ]]] === Accessor ===

    // =========================== Capabilities ========================= [[[

    /// RandR 1.2 or later
    #[must_use]
    pub fn has_randr12(&self) -> bool {
        self.extensions.randr.map_or(false, |v| v.at_least(1, 2))
    }

    /// RandR 1.3 or later
    #[must_use]
    pub fn has_randr13(&self) -> bool {
        self.extensions.randr.map_or(false, |v| v.at_least(1, 3))
    }

    /// RandR 1.5 or later
    #[must_use]
    pub fn has_randr15(&self) -> bool {
        self.extensions.randr.map_or(false, |v| v.at_least(1, 5))
    }

    /// The SHAPE extension is present
    #[must_use]
    pub const fn supports_shapes(&self) -> bool {
        self.extensions.shape.is_some()
    }

    /// SHAPE 1.1 input shapes are available
    #[must_use]
    pub fn supports_input_shapes(&self) -> bool {
        self.extensions.shape.map_or(false, |v| v.at_least(1, 1))
    }

    /// Composite 0.4, Damage and XFixes are all present
    #[must_use]
    pub fn supports_composite(&self) -> bool {
        self.extensions.composite.map_or(false, |v| v.at_least(0, 4))
            && self.extensions.damage.is_some()
            && self.extensions.xfixes.is_some()
    }

    /// Selection owner changes are reported (XFixes)
    #[must_use]
    pub const fn supports_selection_notification(&self) -> bool {
        self.extensions.xfixes.is_some()
    }

    // ]]] === Capabilities ===

    // ============================ Error traps ========================= [[[

    /// Start capturing protocol errors for the requests that follow
    pub fn error_trap_push(&mut self) {
        self.route_queued_errors();
        let next = self.transport.next_request();
        let processed = self.transport.last_processed();
        self.traps.push(next, processed);
    }

    /// Stop capturing and return the code of the last error caught, waiting
    /// for the server to process the trapped requests first
    pub fn error_trap_pop(&mut self) -> u8 {
        self.pop_trap(true)
    }

    /// Stop capturing without waiting. Errors that arrive later for the
    /// trapped requests are still absorbed.
    pub fn error_trap_pop_ignored(&mut self) {
        self.pop_trap(false);
    }

    /// Push a trap that is popped (ignoring errors) when the guard drops
    pub fn error_trap(&mut self) -> TrapGuard<'_> {
        self.error_trap_push();
        TrapGuard {
            display: self,
            popped:  false,
        }
    }

    fn pop_trap(&mut self, checked: bool) -> u8 {
        if self.traps.active_count() == 0 {
            log::warn!("error trap popped without a matching push");
            return SUCCESS;
        }

        if checked && !self.closed {
            let last_sent = self.transport.next_request().wrapping_sub(1);
            if last_sent != self.transport.last_processed() {
                if let Err(e) = self.transport.sync() {
                    self.transport_failed(&e);
                }
            }
        }
        self.route_queued_errors();

        let code = self
            .traps
            .close(self.transport.next_request())
            .unwrap_or(SUCCESS);
        self.traps.reap(self.transport.last_processed());

        if checked {
            code
        } else {
            SUCCESS
        }
    }

    /// Hand the errors already read from the connection to the traps. Replies
    /// move `last_processed` past void requests whose errors are still
    /// queued, so this runs before any trap is reaped.
    fn route_queued_errors(&mut self) {
        if self.closed {
            return;
        }
        match self.transport.drain_errors() {
            Ok(errors) =>
                for error in &errors {
                    self.handle_error(error);
                },
            Err(e) => self.transport_failed(&e),
        }
    }

    /// Route a protocol error to the error traps. An error no trap covers is
    /// fatal.
    pub(crate) fn handle_error(&mut self, error: &XError) {
        if self.traps.deliver(error) == ErrorDisposition::Trapped {
            return;
        }

        let description = error_description(error.error_code);
        log::error!(
            "untrapped X error {} ({}) for serial {}",
            error.error_code,
            description,
            error.serial
        );
        xdpy_fatal!(
            "{}",
            error_diagnostic(&self.settings.program_name, description, error)
        );
    }

    /// A request failed without a protocol error: the connection is gone
    pub(crate) fn transport_failed(&mut self, error: &Error) {
        if let Error::Request(e) = error {
            self.handle_error(e);
            return;
        }
        if !self.closed {
            log::error!(
                "lost the connection to {}: {}",
                self.transport.display_name(),
                error
            );
            self.closed = true;
        }
    }

    /// Unwrap the result of a request with a reply, handing protocol errors
    /// to the error traps
    pub(crate) fn absorb<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.transport_failed(&e);
                None
            },
        }
    }

    /// Issue a request with a reply inside its own error trap
    pub(crate) fn trapped_request<T, F>(&mut self, request: F) -> Option<T>
    where
        F: FnOnce(&mut dyn Transport) -> Result<T>,
    {
        if self.closed {
            return None;
        }
        self.error_trap_push();
        let result = request(self.transport.as_mut());
        let value = self.absorb(result);
        self.error_trap_pop_ignored();
        value
    }

    // ]]] === Error traps ===

    // ============================ Operations ========================== [[[

    /// Replace the rule deciding whether a toplevel is tiled when the window
    /// manager does not publish edge constraints
    pub fn set_tiled_fallback(&mut self, fallback: TiledFallback) {
        self.tiled_fallback = fallback;
    }

    /// Grab the server. Grabs nest; only the outermost one is sent.
    pub fn grab(&mut self) -> Result<()> {
        if self.grab_count == 0 {
            self.transport.grab_server()?;
        }
        self.grab_count += 1;
        Ok(())
    }

    /// Undo one [`grab`](Self::grab)
    pub fn ungrab(&mut self) -> Result<()> {
        if self.grab_count == 0 {
            log::warn!("ungrab without a matching grab");
            return Ok(());
        }

        self.grab_count -= 1;
        if self.grab_count == 0 {
            self.transport.ungrab_server()?;
            self.flush()?;
        }
        Ok(())
    }

    /// Send buffered requests
    pub fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.transport.flush().map_err(|e| {
            self.transport_failed(&e);
            e
        })
    }

    /// Round trip to the server, handling every error that comes back
    pub fn sync(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.transport.sync()?;
        for error in self.transport.drain_errors()? {
            self.handle_error(&error);
        }
        Ok(())
    }

    /// Returns `true` if events are waiting to be dispatched
    pub fn has_pending(&mut self) -> bool {
        if !self.queue.is_empty() {
            return true;
        }
        if self.closed {
            return false;
        }
        let pending = self.transport.has_pending();
        self.absorb(pending).unwrap_or(false)
    }

    /// Ring the bell
    pub fn beep(&mut self) -> Result<()> {
        self.transport.bell(0)
    }

    /// Close the display
    pub fn close(&mut self) {
        if self.closed {
            return;
        }

        let live = self.traps.active_count();
        if live > 0 {
            log::warn!("display closed with {} error trap(s) still pushed", live);
        }

        if let Err(e) = self
            .transport
            .destroy_window(self.leader)
            .and_then(|_| self.transport.flush())
        {
            log::debug!("failed to clean up while closing: {}", e);
        }

        self.closed = true;
        log::info!("closed display {}", self.transport.display_name());
    }

    /// Convert a server timestamp (microseconds) to local monotonic time,
    /// calibrating on first use
    pub fn server_time_to_monotonic(&mut self, server_time: i64) -> i64 {
        if self.oracle.needs_calibration(server_time) {
            let property = self.atoms.get(KnownAtom::TimestampProp);
            match self.transport.server_time(self.leader, property) {
                Ok(ms) => {
                    let now = (self.clock)();
                    self.oracle.calibrate(ms, now);
                },
                Err(e) => log::warn!("failed to read the server time: {}", e),
            }
        }
        self.oracle.convert(server_time)
    }

    /// Force `scale` on the screen and every window
    pub fn set_window_scale(&mut self, scale: i32) {
        let scale = scale.max(1);
        self.screen.fixed_scale = true;
        if self.screen.window_scale == scale {
            return;
        }
        self.screen.window_scale = scale;

        let ids = self.windows.iter().map(|(id, _)| id).collect::<Vec<_>>();
        for id in ids {
            if let Some(record) = self.windows.get_mut(id) {
                record.scale = scale;
                record.size = record.unscaled_size.scale_down(scale);
            }
        }

        log::debug!("window scale forced to {}", scale);
        self.screen_size_changed();
    }

    /// Write or (with `None` or an empty id) remove `SM_CLIENT_ID` on the
    /// leader
    pub fn set_sm_client_id(&mut self, id: Option<&str>) -> Result<()> {
        self.settings.sm_client_id = id.filter(|i| !i.is_empty()).map(ToOwned::to_owned);
        if self.closed {
            return Ok(());
        }

        let atom = self.atoms.get(KnownAtom::SmClientId);
        match id.filter(|i| !i.is_empty()) {
            Some(id) => self.transport.change_property(
                self.leader,
                atom,
                AtomEnum::STRING.into(),
                8,
                PropMode::REPLACE,
                id.as_bytes(),
            ),
            None => self.transport.delete_property(self.leader, atom),
        }
    }

    /// Append a toolkit event to the queue
    pub fn put_event(&mut self, event: Event) {
        self.queue.push_back(event);
    }

    /// Take the next queued toolkit event
    pub fn next_event(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }

    /// Write a format-32 property
    pub(crate) fn set_property32(
        &mut self,
        window: Window,
        property: u32,
        type_: u32,
        values: &[u32],
    ) -> Result<()> {
        let data = values.iter().flat_map(|v| v.to_ne_bytes()).collect::<Vec<_>>();
        self.transport
            .change_property(window, property, type_, 32, PropMode::REPLACE, &data)
    }

    // ]]] === Operations ===
}

// ]]] === Display ===

// ============================= TrapGuard ============================ [[[

/// An error trap tied to a scope.
///
/// Dropping the guard pops the trap ignoring errors;
/// [`pop_checked`](Self::pop_checked) pops it and returns the error code.
pub struct TrapGuard<'a> {
    display: &'a mut Display,
    popped:  bool,
}

impl TrapGuard<'_> {
    /// Pop the trap, waiting for the server, and return the last error code
    pub fn pop_checked(mut self) -> u8 {
        self.popped = true;
        self.display.error_trap_pop()
    }
}

impl Deref for TrapGuard<'_> {
    type Target = Display;

    fn deref(&self) -> &Display {
        self.display
    }
}

impl DerefMut for TrapGuard<'_> {
    fn deref_mut(&mut self) -> &mut Display {
        self.display
    }
}

impl Drop for TrapGuard<'_> {
    fn drop(&mut self) {
        if !self.popped {
            self.display.error_trap_pop_ignored();
        }
    }
}

// ]]] === TrapGuard ===

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{BAD_MATCH, BAD_WINDOW},
        testing::{self, Request, ROOT},
        x::event::{XEvent, XEventKind},
    };

    #[test]
    fn open_sets_up_leader() {
        let fake = testing::FakeTransport::new();
        let display = testing::open_with(&fake);

        let leader = display.leader();
        assert_ne!(leader, NONE);
        assert!(display.is_trusted());
        assert!(display.lookup_window(leader).is_some());
        assert!(display.lookup_window(ROOT).is_some());

        let mut server = fake.server();
        let pid = server.atom("_NET_WM_PID");
        assert_eq!(
            server.property(leader, pid).and_then(|p| p.first_u32()),
            Some(std::process::id())
        );
        let class = server.property(leader, AtomEnum::WM_CLASS.into()).unwrap();
        assert!(class.data.starts_with(b"xdpy\0"));
        assert!(server.requests().iter().any(|(_, r)| matches!(
            r,
            Request::CreateWindow { parent: ROOT, attributes, .. } if attributes.input_only
        )));
    }

    #[test]
    fn sandboxed_leader_has_no_pid() {
        let fake = testing::FakeTransport::new();
        let settings = DisplaySettings {
            sandboxed: true,
            sm_client_id: Some(String::from("sm-1")),
            ..DisplaySettings::default()
        };
        let display = testing::open_with_settings(&fake, settings);
        let mut server = fake.server();
        let pid = server.atom("_NET_WM_PID");
        let sm_client_id = server.atom("SM_CLIENT_ID");
        assert!(server.property(display.leader(), pid).is_none());
        let sm = server.property(display.leader(), sm_client_id).unwrap();
        assert_eq!(sm.data, b"sm-1");
    }

    #[test]
    fn untrusted_connection() {
        let fake = testing::FakeTransport::new();
        fake.server()
            .fail_next(|r| matches!(r, Request::QueryPointer(_)), BAD_WINDOW);
        let mut display = testing::open_with(&fake);
        assert!(!display.is_trusted());
        assert!(!display.supports_hint(KnownAtom::NetWmStateFocused));
    }

    #[test]
    fn trap_absorbs_error() {
        let fake = testing::FakeTransport::new();
        let mut display = testing::open_with(&fake);

        fake.server()
            .fail_next(|r| matches!(r, Request::MapWindow(0xdead)), BAD_WINDOW);
        display.error_trap_push();
        display.transport.map_window(0xdead).unwrap();
        assert_eq!(display.error_trap_pop(), BAD_WINDOW);
        assert_eq!(display.traps.active_count(), 0);
    }

    #[test]
    fn nested_traps_innermost_wins() {
        let fake = testing::FakeTransport::new();
        let mut display = testing::open_with(&fake);

        fake.server()
            .fail_next(|r| matches!(r, Request::UnmapWindow(0x10)), BAD_MATCH);
        display.error_trap_push();
        display.error_trap_push();
        display.transport.unmap_window(0x10).unwrap();
        assert_eq!(display.error_trap_pop(), BAD_MATCH);
        assert_eq!(display.error_trap_pop(), SUCCESS);
    }

    #[test]
    fn outdated_traps_are_reaped() {
        let fake = testing::FakeTransport::new();
        let mut display = testing::open_with(&fake);

        display.error_trap_push();
        display.transport.map_window(0x10).unwrap();
        let end = display.next_serial();
        display.error_trap_pop_ignored();
        assert!(display.traps.iter().any(|t| t.end_sequence == Some(end)));

        fake.server().set_last_processed(end.wrapping_add(10));
        display.error_trap_push();
        assert_eq!(display.traps.len(), 1);
        assert_eq!(display.traps.active_count(), 1);
        display.error_trap_pop_ignored();
    }

    #[test]
    fn queued_error_is_trapped_after_a_later_reply() {
        let fake = testing::FakeTransport::new();
        let mut display = testing::open_with(&fake);

        display.error_trap_push();
        let serial = display.next_serial();
        display.transport.set_input_focus(0xbad, CURRENT_TIME).unwrap();
        display.error_trap_pop_ignored();

        // The error is read while the reply to the next request is awaited
        fake.server().push_event(XEvent::new(
            serial,
            XEventKind::Error(testing::xerror(serial, BAD_WINDOW)),
        ));
        let position = display.trapped_request(|t| t.translate_coordinates(ROOT, ROOT, 0, 0));
        assert!(position.is_some());

        display.queue_pending().unwrap();
        assert!(!display.is_closed());
        assert_eq!(display.traps.active_count(), 0);
    }

    #[test]
    fn traps_survive_serial_wraparound() {
        let fake = testing::FakeTransport::new();
        let mut display = testing::open_with(&fake);
        {
            let mut server = fake.server();
            server.set_next_serial(u32::MAX - 1);
            server.set_last_processed(u32::MAX - 2);
            server.fail_next(|r| matches!(r, Request::MapWindow(0x20)), BAD_WINDOW);
        }

        display.error_trap_push();
        display.transport.map_window(0x10).unwrap();
        display.transport.map_window(0x11).unwrap();
        display.transport.map_window(0x20).unwrap();
        assert_eq!(display.error_trap_pop(), BAD_WINDOW);
    }

    #[test]
    fn guard_pops_on_drop() {
        let fake = testing::FakeTransport::new();
        let mut display = testing::open_with(&fake);
        {
            let mut trap = display.error_trap();
            trap.transport.map_window(0x10).unwrap();
        }
        assert_eq!(display.traps.active_count(), 0);

        fake.server()
            .fail_next(|r| matches!(r, Request::MapWindow(0x11)), BAD_WINDOW);
        let mut trap = display.error_trap();
        trap.transport.map_window(0x11).unwrap();
        assert_eq!(trap.pop_checked(), BAD_WINDOW);
    }

    #[test]
    fn pop_without_push_is_harmless() {
        let fake = testing::FakeTransport::new();
        let mut display = testing::open_with(&fake);
        assert_eq!(display.error_trap_pop(), SUCCESS);
    }

    #[test]
    #[should_panic(expected = "received an X Window System error")]
    fn untrapped_error_is_fatal() {
        let fake = testing::FakeTransport::new();
        let mut display = testing::open_with(&fake);
        display.handle_error(&testing::xerror(4242, BAD_WINDOW));
    }

    #[test]
    fn grabs_nest() {
        let fake = testing::FakeTransport::new();
        let mut display = testing::open_with(&fake);
        fake.server().clear_requests();

        display.grab().unwrap();
        display.grab().unwrap();
        display.ungrab().unwrap();
        display.ungrab().unwrap();
        display.ungrab().unwrap();

        let requests = fake
            .server()
            .requests()
            .iter()
            .map(|(_, r)| r.clone())
            .collect::<Vec<_>>();
        assert_eq!(requests, vec![Request::GrabServer, Request::UngrabServer]);
    }

    #[test]
    fn server_time_identity() {
        let fake = testing::FakeTransport::new();
        let mut display = testing::open_with(&fake);
        testing::set_now(5_200_000);
        fake.server().server_time_ms = 5_000;

        assert_eq!(display.server_time_to_monotonic(7_123_456), 7_123_456);
        let queries = fake
            .server()
            .requests()
            .iter()
            .filter(|(_, r)| matches!(r, Request::ServerTime(_)))
            .count();
        assert_eq!(queries, 1);
        display.server_time_to_monotonic(9_000_000);
        assert_eq!(
            fake.server()
                .requests()
                .iter()
                .filter(|(_, r)| matches!(r, Request::ServerTime(_)))
                .count(),
            1
        );
    }

    #[test]
    fn capabilities_follow_extensions() {
        let fake = testing::FakeTransport::new();
        fake.server().extensions = testing::all_extensions();
        let display = testing::open_with(&fake);
        assert!(display.supports_composite());
        assert!(display.supports_input_shapes());
        assert!(display.has_randr13());
        assert!(!display.has_randr15());
        assert!(display.uses_sync());
        assert!(display.uses_xkb());

        let bare = testing::open_with(&testing::FakeTransport::new());
        assert!(!bare.supports_composite());
        assert!(!bare.supports_selection_notification());
        assert!(!bare.uses_sync());
    }

    #[test]
    fn window_scale_is_clamped_and_applied() {
        let fake = testing::FakeTransport::new();
        let mut display = testing::open_with(&fake);
        display.set_window_scale(0);
        assert_eq!(display.screen().window_scale(), 1);
        display.set_window_scale(2);
        assert_eq!(display.screen().size(), Dimension::new(960, 540));
        let root = display.screen().root_id();
        assert_eq!(display.window(root).map(|r| r.scale), Some(2));
    }

    #[test]
    fn flush_after_close_is_noop() {
        let fake = testing::FakeTransport::new();
        let mut display = testing::open_with(&fake);
        display.error_trap_push();
        display.close();
        assert!(display.is_closed());
        assert!(display.flush().is_ok());
        assert!(display.sync().is_ok());
    }

    #[test]
    fn root_and_serial() {
        let fake = testing::FakeTransport::new();
        let mut display = testing::open_with(&fake);
        assert!(display.is_root_window(ROOT));
        assert!(!display.is_root_window(display.leader()));
        let serial = display.next_serial();
        display.beep().unwrap();
        assert_eq!(display.next_serial(), serial + 1);
        assert_eq!(fake.server().requests().last().map(|(_, r)| r.clone()), Some(Request::Bell(0)));
    }
}
