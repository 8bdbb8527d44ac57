//! Windows known to the display, kept in an arena and looked up by X id

use crate::{
    core::{server_time_is_later, Serial, Timestamp, Window, WindowKind, Xid, CURRENT_TIME},
    display::Display,
    error::{Error, Result},
    event::{Event, EventKind, EventMask},
    geometry::{Dimension, Point, Rectangle},
    toplevel::{Toplevel, WindowState},
    x::{atoms::KnownAtom, transport::WindowAttributes},
};
use std::{
    collections::{HashMap, HashSet},
    fmt,
};
use x11rb::protocol::xproto::{self, AtomEnum};

/// Index of a window in the [`WindowStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(usize);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything the display tracks about one window
#[derive(Debug, Clone)]
pub struct WindowRecord {
    /// The X id
    pub xid:               Window,
    /// Role of the window
    pub kind:              WindowKind,
    /// Parent window, `None` for roots
    pub parent:            Option<WindowId>,
    /// Screen the window lives on
    pub screen:            usize,
    /// Published state
    pub state:             WindowState,
    /// The window was destroyed by the toolkit; its `DestroyNotify` has not
    /// been seen yet
    pub destroyed:         bool,
    /// Position (root relative for toplevels) in logical pixels
    pub position:          Point,
    /// Size in logical pixels
    pub size:              Dimension,
    /// Size in device pixels
    pub unscaled_size:     Dimension,
    /// Device pixels per logical pixel
    pub scale:             i32,
    /// Configure events still expected for an in-progress move/resize
    pub resize_count:      u32,
    /// Toolkit events the window wants
    pub event_mask:        EventMask,
    /// The window takes the input focus on `WM_TAKE_FOCUS`
    pub accept_focus:      bool,
    /// The window is drawn by the compositor into its parent
    pub composited:        bool,
    /// Damage object of a composited window
    pub damage:            Option<Xid>,
    /// Visible as far as the toolkit knows
    pub viewable:          bool,
    /// Holds on toplevel updates (unmapped, waiting for the window manager)
    pub update_freeze_count: u32,
    /// Toplevel bookkeeping, for toplevel kinds only
    pub toplevel:          Option<Toplevel>,
}

impl WindowRecord {
    /// Create a record in its initial (withdrawn) state
    #[must_use]
    pub fn new(xid: Window, kind: WindowKind, parent: Option<WindowId>, geometry: Rectangle, scale: i32) -> Self {
        let scale = scale.max(1);
        Self {
            xid,
            kind,
            parent,
            screen: 0,
            state: WindowState::WITHDRAWN,
            destroyed: false,
            position: geometry.point,
            size: geometry.dimension,
            unscaled_size: Dimension::new(
                geometry.width() * scale,
                geometry.height() * scale,
            ),
            scale,
            resize_count: 0,
            event_mask: EventMask::empty(),
            accept_focus: true,
            composited: false,
            damage: None,
            viewable: false,
            update_freeze_count: 0,
            toplevel: kind.is_toplevel().then(|| Toplevel::new(xid)),
        }
    }

    /// Returns `true` unless the window is withdrawn
    #[must_use]
    pub const fn is_mapped(&self) -> bool {
        !self.state.contains(WindowState::WITHDRAWN)
    }

    /// Serial of the last map request, `0` for non-toplevels
    #[must_use]
    pub fn map_serial(&self) -> Serial {
        self.toplevel.as_ref().map_or(0, |t| t.map_serial)
    }
}

/// What an X id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// A window with a record
    Window(WindowId),
    /// A pixmap used as a drawable
    Pixmap,
    /// Nothing the display knows about
    Unknown,
}

/// Arena of window records
#[derive(Debug, Clone, Default)]
pub struct WindowStore {
    records: Vec<Option<WindowRecord>>,
    by_xid:  HashMap<Xid, WindowId>,
    pixmaps: HashSet<Xid>,
}

impl WindowStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a window. An existing record for the same X id is replaced.
    pub fn insert(&mut self, record: WindowRecord) -> WindowId {
        let xid = record.xid;
        if let Some(old) = self.by_xid.get(&xid).copied() {
            log::debug!("replacing record for 0x{:x}", xid);
            self.records[old.0] = Some(record);
            return old;
        }

        let id = WindowId(self.records.len());
        self.records.push(Some(record));
        self.by_xid.insert(xid, id);
        id
    }

    /// Forget a window
    pub fn remove(&mut self, id: WindowId) -> Option<WindowRecord> {
        let record = self.records.get_mut(id.0)?.take()?;
        self.by_xid.remove(&record.xid);
        Some(record)
    }

    /// Register an X id as a pixmap
    pub fn insert_pixmap(&mut self, xid: Xid) {
        self.pixmaps.insert(xid);
    }

    /// Forget a pixmap
    pub fn remove_pixmap(&mut self, xid: Xid) {
        self.pixmaps.remove(&xid);
    }

    /// Resolve an X id
    #[must_use]
    pub fn lookup(&self, xid: Xid) -> Lookup {
        if let Some(id) = self.by_xid.get(&xid) {
            Lookup::Window(*id)
        } else if self.pixmaps.contains(&xid) {
            Lookup::Pixmap
        } else {
            Lookup::Unknown
        }
    }

    /// The window record for an X id
    #[must_use]
    pub fn find(&self, xid: Xid) -> Option<WindowId> {
        self.by_xid.get(&xid).copied()
    }

    /// Borrow a record
    #[must_use]
    pub fn get(&self, id: WindowId) -> Option<&WindowRecord> {
        self.records.get(id.0)?.as_ref()
    }

    /// Mutably borrow a record
    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut WindowRecord> {
        self.records.get_mut(id.0)?.as_mut()
    }

    /// Toplevel bookkeeping of a window
    #[must_use]
    pub fn toplevel(&self, id: WindowId) -> Option<&Toplevel> {
        self.get(id)?.toplevel.as_ref()
    }

    /// Mutable toplevel bookkeeping of a window
    pub fn toplevel_mut(&mut self, id: WindowId) -> Option<&mut Toplevel> {
        self.get_mut(id)?.toplevel.as_mut()
    }

    /// Iterate over every live record
    pub fn iter(&self) -> impl Iterator<Item = (WindowId, &WindowRecord)> {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().map(|r| (WindowId(i), r)))
    }

    /// Number of live records
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_xid.len()
    }

    /// Returns `true` if no window is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_xid.is_empty()
    }
}

// ============================ Operations ============================ [[[

impl Display {
    fn record(&self, id: WindowId) -> Result<&WindowRecord> {
        self.windows.get(id).ok_or(Error::NoRecord(id))
    }

    fn record_mut(&mut self, id: WindowId) -> Result<&mut WindowRecord> {
        self.windows.get_mut(id).ok_or(Error::NoRecord(id))
    }

    /// Create a window. `geometry` is in logical pixels relative to `parent`,
    /// which defaults to the root window.
    pub fn create_window(
        &mut self,
        kind: WindowKind,
        parent: Option<WindowId>,
        geometry: Rectangle,
    ) -> Result<WindowId> {
        let parent_id = parent.unwrap_or(self.screen.root_id);
        let parent_xid = self.record(parent_id)?.xid;
        let scale = self.screen.window_scale;

        let device = Rectangle::new(
            geometry.x() * scale,
            geometry.y() * scale,
            geometry.width() * scale,
            geometry.height() * scale,
        );
        let xid = self.transport.create_window(parent_xid, device, WindowAttributes {
            override_redirect: kind == WindowKind::Temp,
            event_mask:        xproto::EventMask::STRUCTURE_NOTIFY
                | xproto::EventMask::PROPERTY_CHANGE,
            input_only:        false,
        })?;

        let mut record = WindowRecord::new(xid, kind, Some(parent_id), geometry, scale);
        record.screen = self.screen.number;
        if matches!(kind, WindowKind::Toplevel | WindowKind::Temp) {
            // Released by the first MapNotify
            record.update_freeze_count = 1;
            if let Some(toplevel) = record.toplevel.as_mut() {
                toplevel.frame_clock.freeze();
            }
        }
        let id = self.windows.insert(record);

        if kind == WindowKind::Toplevel {
            self.init_toplevel(id, xid)?;
        }

        log::debug!("created {} window 0x{:x} ({})", kind, xid, id);
        Ok(id)
    }

    /// Advertise the protocols, sync counters and the client leader
    fn init_toplevel(&mut self, id: WindowId, xid: Window) -> Result<()> {
        let mut protocols = vec![
            KnownAtom::WmDeleteWindow,
            KnownAtom::WmTakeFocus,
            KnownAtom::NetWmPing,
        ];

        if self.use_sync {
            let basic = self.transport.create_counter(0)?;
            let extended = self.transport.create_counter(0)?;
            if let Some(toplevel) = self.windows.toplevel_mut(id) {
                toplevel.update_counter = basic;
                toplevel.extended_update_counter = extended;
            }

            let atom = self.atoms.get(KnownAtom::NetWmSyncRequestCounter);
            self.set_property32(xid, atom, AtomEnum::CARDINAL.into(), &[basic, extended])?;
            protocols.push(KnownAtom::NetWmSyncRequest);
        }

        let protocols = protocols
            .into_iter()
            .map(|p| self.atoms.get(p))
            .collect::<Vec<_>>();
        let wm_protocols = self.atoms.get(KnownAtom::WmProtocols);
        self.set_property32(xid, wm_protocols, AtomEnum::ATOM.into(), &protocols)?;

        let leader = self.atoms.get(KnownAtom::WmClientLeader);
        self.set_property32(xid, leader, AtomEnum::WINDOW.into(), &[self.leader])
    }

    /// Track a window created by another client
    pub fn register_foreign(&mut self, xid: Window) -> WindowId {
        if let Some(id) = self.windows.find(xid) {
            return id;
        }

        let mut record = WindowRecord::new(
            xid,
            WindowKind::Foreign,
            Some(self.screen.root_id),
            Rectangle::default(),
            self.screen.window_scale,
        );
        record.screen = self.screen.number;
        log::trace!("tracking foreign window 0x{:x}", xid);
        self.windows.insert(record)
    }

    /// Mark `xid` as a pixmap so events for it are dropped
    pub fn register_pixmap(&mut self, xid: Xid) {
        self.windows.insert_pixmap(xid);
    }

    /// Forget a pixmap registered with
    /// [`register_pixmap`](Self::register_pixmap)
    pub fn unregister_pixmap(&mut self, xid: Xid) {
        self.windows.remove_pixmap(xid);
    }

    /// Destroy a window. The record lives until the server confirms with
    /// `DestroyNotify`.
    pub fn destroy_window(&mut self, id: WindowId) -> Result<()> {
        let record = self.record_mut(id)?;
        if record.destroyed {
            return Ok(());
        }
        record.destroyed = true;
        let xid = record.xid;

        log::debug!("destroying window 0x{:x}", xid);
        self.transport.destroy_window(xid)
    }

    /// Map a window
    pub fn show(&mut self, id: WindowId) -> Result<()> {
        let next = self.transport.next_request();
        let record = self.record_mut(id)?;
        let xid = record.xid;
        if let Some(toplevel) = record.toplevel.as_mut() {
            toplevel.map_serial = next;
        }
        record.viewable = true;

        self.transport.map_window(xid)?;
        self.synthesize_window_state(id, WindowState::WITHDRAWN, WindowState::empty());
        Ok(())
    }

    /// Unmap a window
    pub fn hide(&mut self, id: WindowId) -> Result<()> {
        let record = self.record_mut(id)?;
        let xid = record.xid;
        record.viewable = false;

        self.synthesize_window_state(id, WindowState::empty(), WindowState::WITHDRAWN);
        self.transport.unmap_window(xid)
    }

    /// Change the toolkit events `id` receives
    pub fn select_window_events(&mut self, id: WindowId, mask: EventMask) -> Result<()> {
        let record = self.record_mut(id)?;
        record.event_mask = mask;
        let xid = record.xid;

        let mut translators = self.translators.detach();
        let result = translators
            .iter_mut()
            .try_for_each(|t| t.select_window_events(self, xid, mask));
        self.translators.reattach(translators);
        result
    }

    /// Set the user interaction time of a toplevel
    pub fn set_user_time(&mut self, id: WindowId, timestamp: Timestamp) -> Result<()> {
        let record = self.record(id)?;
        let xid = match record.toplevel.as_ref() {
            Some(_) => record.xid,
            None => {
                log::warn!("user time set on non-toplevel window 0x{:x}", record.xid);
                return Ok(());
            },
        };

        let atom = self.atoms.get(KnownAtom::NetWmUserTime);
        self.set_property32(xid, atom, AtomEnum::CARDINAL.into(), &[timestamp])?;

        if timestamp != CURRENT_TIME
            && (self.user_time == CURRENT_TIME
                || server_time_is_later(timestamp, self.user_time))
        {
            self.user_time = timestamp;
        }
        if let Some(toplevel) = self.windows.toplevel_mut(id) {
            toplevel.user_time = timestamp;
        }
        Ok(())
    }

    /// Move a window from its current state by clearing `unset` and adding
    /// `set`. A change is queued as a window-state event.
    pub fn synthesize_window_state(&mut self, id: WindowId, unset: WindowState, set: WindowState) {
        let record = match self.windows.get_mut(id) {
            Some(record) => record,
            None => return,
        };

        let old = record.state;
        let new = (old - unset) | set;
        if new == old {
            return;
        }
        record.state = new;

        log::debug!("window 0x{:x} state {:?} -> {:?}", record.xid, old, new);
        self.queue.push_back(Event::new(
            EventKind::WindowState {
                changed:   old ^ new,
                new_state: new,
            },
            Some(id),
        ));
    }

    /// Queue a repaint of `area` (logical pixels)
    pub fn process_expose(&mut self, id: WindowId, serial: Serial, area: Rectangle, count: u16) {
        let mut event = Event::new(EventKind::Expose { area, count }, Some(id));
        event.serial = serial;
        self.queue.push_back(event);
    }

    /// Hold updates of a toplevel (its frame clock stops producing frames)
    pub fn freeze_toplevel_updates(&mut self, id: WindowId) {
        if let Some(record) = self.windows.get_mut(id) {
            record.update_freeze_count += 1;
            if let Some(toplevel) = record.toplevel.as_mut() {
                toplevel.frame_clock.freeze();
            }
        }
    }

    /// Undo one [`freeze_toplevel_updates`](Self::freeze_toplevel_updates)
    pub fn thaw_toplevel_updates(&mut self, id: WindowId) {
        if let Some(record) = self.windows.get_mut(id) {
            if record.update_freeze_count == 0 {
                log::warn!("toplevel updates of 0x{:x} thawed while not frozen", record.xid);
                return;
            }
            record.update_freeze_count -= 1;
            if let Some(toplevel) = record.toplevel.as_mut() {
                toplevel.frame_clock.thaw();
            }
        }
    }
}

// ]]] === Operations ===
