//! The default screen: its root window, the window manager running on it and
//! whether a compositing manager owns `_NET_WM_CM_Sn`.
//!
//! The window manager is found through the `_NET_SUPPORTING_WM_CHECK` window.
//! Once found, `StructureNotify` is selected on it so its destruction is seen
//! by the translator, which resets the cached identity.

use crate::{
    core::{Atom, ObserverHandle, Window, NONE, SUCCESS, UNKNOWN_WM_NAME, WM_CHECK_INTERVAL_US},
    display::Display,
    geometry::Dimension,
    window::WindowId,
    x::{atoms::KnownAtom, event::OwnerChangeEvent, property::PropertyValue},
};
use std::fmt;
use x11rb::protocol::xproto::{AtomEnum, EventMask};

/// Something observers of a [`Screen`] are told about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenNotification {
    /// A window manager appeared or went away
    WindowManagerChanged,
    /// The root window changed size (logical pixels)
    SizeChanged(Dimension),
    /// A compositing manager started or stopped
    CompositedChanged(bool),
}

type Observer = Box<dyn FnMut(&ScreenNotification)>;

// =============================== Screen ============================= [[[

/// State of the default screen
pub struct Screen {
    pub(crate) number:        usize,
    pub(crate) root:          Window,
    pub(crate) root_id:       WindowId,
    /// Root size in logical pixels
    pub(crate) size:          Dimension,
    pub(crate) window_scale:  i32,
    /// The scale was forced and desktop settings are ignored
    pub(crate) fixed_scale:   bool,
    /// `_NET_WM_CM_Sn` for this screen
    pub(crate) cm_selection:  Atom,
    pub(crate) is_composited: bool,

    wm_check_window:            Window,
    last_wm_check_time:         i64,
    wm_name:                    String,
    need_refetch_net_supported: bool,
    need_refetch_wm_name:       bool,
    net_supported:              Option<Vec<Atom>>,

    observers:     Vec<(ObserverHandle, Observer)>,
    next_observer: u64,
}

impl fmt::Debug for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screen")
            .field("number", &self.number)
            .field("root", &self.root)
            .field("size", &self.size)
            .field("window_scale", &self.window_scale)
            .field("wm_check_window", &self.wm_check_window)
            .field("wm_name", &self.wm_name)
            .field("is_composited", &self.is_composited)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Screen {
    /// Create the screen for `root`
    pub(crate) fn new(
        number: usize,
        root: Window,
        root_id: WindowId,
        size: Dimension,
        window_scale: i32,
        fixed_scale: bool,
        cm_selection: Atom,
    ) -> Self {
        Self {
            number,
            root,
            root_id,
            size,
            window_scale,
            fixed_scale,
            cm_selection,
            is_composited: false,
            wm_check_window: NONE,
            last_wm_check_time: 0,
            wm_name: UNKNOWN_WM_NAME.to_owned(),
            need_refetch_net_supported: false,
            need_refetch_wm_name: false,
            net_supported: None,
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    /// Index of the screen on the display
    #[must_use]
    pub const fn number(&self) -> usize {
        self.number
    }

    /// The root window
    #[must_use]
    pub const fn root(&self) -> Window {
        self.root
    }

    /// Record of the root window
    #[must_use]
    pub const fn root_id(&self) -> WindowId {
        self.root_id
    }

    /// Size of the root window in logical pixels
    #[must_use]
    pub const fn size(&self) -> Dimension {
        self.size
    }

    /// Device pixels per logical pixel
    #[must_use]
    pub const fn window_scale(&self) -> i32 {
        self.window_scale
    }

    /// Returns `true` while a compositing manager owns `_NET_WM_CM_Sn`
    #[must_use]
    pub const fn is_composited(&self) -> bool {
        self.is_composited
    }

    /// The validated `_NET_SUPPORTING_WM_CHECK` window, if any
    #[must_use]
    pub const fn wm_check_window(&self) -> Option<Window> {
        if self.wm_check_window == NONE {
            None
        } else {
            Some(self.wm_check_window)
        }
    }

    /// Register a callback for [`ScreenNotification`]s
    pub fn connect<F>(&mut self, observer: F) -> ObserverHandle
    where
        F: FnMut(&ScreenNotification) + 'static,
    {
        self.next_observer += 1;
        let handle = ObserverHandle(self.next_observer);
        self.observers.push((handle, Box::new(observer)));
        handle
    }

    /// Remove a callback. Returns `false` if the handle was not registered.
    pub fn disconnect(&mut self, handle: ObserverHandle) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(h, _)| *h != handle);
        before != self.observers.len()
    }

    pub(crate) fn notify(&mut self, notification: ScreenNotification) {
        log::debug!("screen {}: {:?}", self.number, notification);
        for (_, observer) in &mut self.observers {
            observer(&notification);
        }
    }

    /// The check window was destroyed; forget the window manager
    pub(crate) fn wm_check_destroyed(&mut self) {
        self.wm_check_window = NONE;
        self.last_wm_check_time = 0;
        self.wm_name = UNKNOWN_WM_NAME.to_owned();
        self.notify(ScreenNotification::WindowManagerChanged);
    }
}

// ]]] === Screen ===

// =========================== Window manager ========================= [[[

impl Display {
    /// `_NET_SUPPORTING_WM_CHECK` of `window`, `NONE` if unset or unreadable
    fn supporting_wm_check(&mut self, window: Window) -> Window {
        let atom = self.atoms.get(KnownAtom::NetSupportingWmCheck);
        let reply =
            self.trapped_request(|t| t.get_property(window, atom, AtomEnum::WINDOW.into()));

        match reply.and_then(|r| PropertyValue::decode(&self.atoms, atom, r)) {
            Some(PropertyValue::SupportingWmCheck(check)) => check,
            _ => NONE,
        }
    }

    /// Look for an EWMH window manager and start watching its check window
    pub(crate) fn fetch_net_wm_check_window(&mut self) {
        if !self.trusted {
            log::warn!("window manager lookup on an untrusted connection");
            return;
        }
        if self.screen.wm_check_window != NONE {
            return;
        }

        let now = (self.clock)();
        let last = self.screen.last_wm_check_time;
        if last != 0 && now - last < WM_CHECK_INTERVAL_US {
            return;
        }
        self.screen.last_wm_check_time = now;

        let window = self.supporting_wm_check(self.screen.root);
        if window == NONE || self.supporting_wm_check(window) != window {
            return;
        }

        let code = {
            let mut trap = self.error_trap();
            if let Err(e) = trap.transport.select_input(window, EventMask::STRUCTURE_NOTIFY) {
                trap.transport_failed(&e);
            }
            trap.pop_checked()
        };
        if code != SUCCESS {
            log::debug!("check window 0x{:x} vanished before it could be watched", window);
            return;
        }

        // The id may have been recycled between the reads and the selection
        if self.supporting_wm_check(window) != window {
            return;
        }

        log::debug!("window manager check window is 0x{:x}", window);
        self.screen.wm_check_window = window;
        self.screen.need_refetch_net_supported = true;
        self.screen.need_refetch_wm_name = true;
        self.screen.notify(ScreenNotification::WindowManagerChanged);
    }

    /// Returns `true` if the window manager lists `hint` in `_NET_SUPPORTED`
    pub fn supports_net_wm_hint(&mut self, hint: Atom) -> bool {
        if !self.trusted || hint == NONE {
            return false;
        }

        self.fetch_net_wm_check_window();
        if self.screen.wm_check_window == NONE {
            return false;
        }

        if self.screen.need_refetch_net_supported {
            self.screen.need_refetch_net_supported = false;
            self.screen.net_supported = None;

            let atom = self.atoms.get(KnownAtom::NetSupported);
            let root = self.screen.root;
            let reply =
                self.trapped_request(|t| t.get_property(root, atom, AtomEnum::ATOM.into()));
            match reply.and_then(|r| PropertyValue::decode(&self.atoms, atom, r)) {
                Some(PropertyValue::Supported(list)) => {
                    log::debug!("window manager supports {} hints", list.len());
                    self.screen.net_supported = Some(list);
                },
                _ => return false,
            }
        }

        self.screen
            .net_supported
            .as_ref()
            .map_or(false, |list| list.contains(&hint))
    }

    /// [`supports_net_wm_hint`](Self::supports_net_wm_hint) for a well known
    /// atom
    pub fn supports_hint(&mut self, hint: KnownAtom) -> bool {
        let atom = self.atoms.get(hint);
        self.supports_net_wm_hint(atom)
    }

    /// Name of the running window manager, `"unknown"` if there is none
    pub fn window_manager_name(&mut self) -> String {
        if !self.trusted {
            return self.screen.wm_name.clone();
        }

        self.fetch_net_wm_check_window();

        if self.screen.need_refetch_wm_name {
            self.screen.need_refetch_wm_name = false;
            self.screen.wm_name = UNKNOWN_WM_NAME.to_owned();

            let check = self.screen.wm_check_window;
            if check != NONE {
                let atom = self.atoms.get(KnownAtom::NetWmName);
                let utf8 = self.atoms.get(KnownAtom::Utf8String);
                let reply = self.trapped_request(|t| t.get_property(check, atom, utf8));
                if let Some(PropertyValue::WmName(name)) =
                    reply.and_then(|r| PropertyValue::decode(&self.atoms, atom, r))
                {
                    self.screen.wm_name = name;
                }
            }
        }

        self.screen.wm_name.clone()
    }

    // ]]] === Window manager ===

    // ============================ Compositing ========================= [[[

    /// Start following the owner of `_NET_WM_CM_Sn`
    pub(crate) fn init_compositing(&mut self) {
        if !self.supports_selection_notification() {
            return;
        }

        let root = self.screen.root;
        let selection = self.screen.cm_selection;
        if let Err(e) = self.transport.select_selection_input(root, selection) {
            self.transport_failed(&e);
            return;
        }

        let owner = self.trapped_request(|t| t.selection_owner(selection));
        self.screen.is_composited = owner.map_or(false, |o| o != NONE);
        log::debug!("compositing manager running: {}", self.screen.is_composited);
    }

    /// React to an XFIXES selection owner change
    pub(crate) fn process_owner_change(&mut self, event: &OwnerChangeEvent) {
        if event.selection != self.screen.cm_selection {
            return;
        }

        let composited = event.owner != NONE;
        if composited != self.screen.is_composited {
            self.screen.is_composited = composited;
            self.screen
                .notify(ScreenNotification::CompositedChanged(composited));
        }
    }

    /// Compare the root window's size with the last one announced
    pub(crate) fn screen_size_changed(&mut self) {
        let size = match self.windows.get(self.screen.root_id) {
            Some(root) => root.size,
            None => return,
        };

        if size != self.screen.size {
            self.screen.size = size;
            self.screen.notify(ScreenNotification::SizeChanged(size));
        }
    }

    // ]]] === Compositing ===
}
