//! The wire. Everything the display sends to or reads from the server goes
//! through [`Transport`], implemented on top of `x11rb`'s [`RustConnection`].

use crate::{
    core::{Atom, Serial, Timestamp, Window, Xid, NONE},
    error::{Error, Result, XError},
    geometry::{Dimension, Rectangle},
    x::{
        event::{
            ClientMessageData,
            ClientMessageEvent,
            ConfigureEvent,
            DamageEvent,
            ExposeEvent,
            OwnerChangeEvent,
            OwnerChangeReason,
            PropertyEvent,
            ReparentEvent,
            SelectionEvent,
            Visibility,
            XEvent,
            XEventKind,
            XkbStateEvent,
        },
        property::PropertyReply,
    },
};
use std::{collections::VecDeque, os::unix::io::RawFd};
use x11rb::{
    connection::{Connection, RequestConnection},
    errors::ReplyError,
    protocol::{
        composite::ConnectionExt as _,
        damage::{self, ConnectionExt as _},
        randr::ConnectionExt as _,
        shape::ConnectionExt as _,
        sync::{self, ConnectionExt as _},
        xfixes::{self, ConnectionExt as _},
        xkb::ConnectionExt as _,
        xproto::{
            self,
            AtomEnum,
            ChangeWindowAttributesAux,
            ConnectionExt as _,
            CreateWindowAux,
            EventMask,
            InputFocus,
            PropMode,
            WindowClass,
        },
        Event,
    },
    rust_connection::RustConnection,
    wrapper::ConnectionExt as _,
    COPY_DEPTH_FROM_PARENT,
    COPY_FROM_PARENT,
};

// ============================ Support types =========================

/// Version and opcodes of an extension found on the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionVersion {
    /// Major opcode of the extension's requests
    pub major_opcode: u8,
    /// First event code of the extension
    pub first_event:  u8,
    /// Negotiated `(major, minor)` version
    pub version:      (u32, u32),
}

impl ExtensionVersion {
    /// Returns `true` if the negotiated version is at least `major.minor`
    #[must_use]
    pub const fn at_least(&self, major: u32, minor: u32) -> bool {
        self.version.0 > major || (self.version.0 == major && self.version.1 >= minor)
    }
}

/// Extensions the display makes use of
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extensions {
    pub randr:     Option<ExtensionVersion>,
    pub xfixes:    Option<ExtensionVersion>,
    pub composite: Option<ExtensionVersion>,
    pub damage:    Option<ExtensionVersion>,
    pub shape:     Option<ExtensionVersion>,
    pub xkb:       Option<ExtensionVersion>,
    pub sync:      Option<ExtensionVersion>,
}

/// A root window and its size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenInfo {
    /// The root window
    pub root:   Window,
    /// Width in device pixels
    pub width:  i32,
    /// Height in device pixels
    pub height: i32,
}

/// Attributes of a window created by the display itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAttributes {
    /// Bypass the window manager
    pub override_redirect: bool,
    /// Core events to select
    pub event_mask:        EventMask,
    /// Create an `InputOnly` window
    pub input_only:        bool,
}

/// Secondary connections opened or closed by the client library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionChange {
    /// A new descriptor should be watched
    Opened(RawFd),
    /// A descriptor should no longer be watched
    Closed(RawFd),
}

// ============================== Transport ===========================

/// Operations the display needs from an X connection
pub trait Transport {
    /// Name of the display the connection was opened on
    fn display_name(&self) -> &str;
    /// Index of the default screen
    fn default_screen(&self) -> usize;
    /// All screens of the display
    fn screens(&self) -> Vec<ScreenInfo>;
    /// Descriptor of the primary connection
    fn raw_fd(&self) -> Option<RawFd>;

    /// Serial the next request will get
    fn next_request(&self) -> Serial;
    /// Highest serial known to have been processed by the server
    fn last_processed(&self) -> Serial;
    /// Round trip after every request
    fn set_synchronous(&mut self, synchronous: bool);

    /// Send all buffered requests
    fn flush(&mut self) -> Result<()>;
    /// Round trip to the server. Errors produced meanwhile are queued and can
    /// be collected with [`drain_errors`](Self::drain_errors).
    fn sync(&mut self) -> Result<()>;
    /// Next queued event without blocking
    fn poll_event(&mut self) -> Result<Option<XEvent>>;
    /// Returns `true` if [`poll_event`](Self::poll_event) would return an event
    fn has_pending(&mut self) -> Result<bool>;
    /// Pull every error that has already arrived, keeping other events queued
    fn drain_errors(&mut self) -> Result<Vec<XError>>;

    /// Intern several atoms with a single round trip
    fn intern_atoms(&mut self, names: &[&str]) -> Result<Vec<Atom>>;
    /// Name of an atom
    fn atom_name(&mut self, atom: Atom) -> Result<String>;

    /// Read a whole property, `type_ == NONE` accepts any type
    fn get_property(&mut self, window: Window, property: Atom, type_: Atom)
        -> Result<PropertyReply>;
    /// Write a property
    fn change_property(
        &mut self,
        window: Window,
        property: Atom,
        type_: Atom,
        format: u8,
        mode: PropMode,
        data: &[u8],
    ) -> Result<()>;
    /// Remove a property
    fn delete_property(&mut self, window: Window, property: Atom) -> Result<()>;

    /// Translate `(x, y)` from `src` into `dst` coordinates
    fn translate_coordinates(&mut self, src: Window, dst: Window, x: i16, y: i16)
        -> Result<(i32, i32)>;
    /// Send a client message
    fn send_client_message(
        &mut self,
        destination: Window,
        propagate: bool,
        mask: EventMask,
        message: ClientMessageEvent,
    ) -> Result<()>;
    /// Give the input focus to `window`, reverting to its parent
    fn set_input_focus(&mut self, window: Window, time: Timestamp) -> Result<()>;
    /// Round trip that also reports the pointer position
    fn query_pointer(&mut self, window: Window) -> Result<(i32, i32)>;

    /// Create a window
    fn create_window(
        &mut self,
        parent: Window,
        geometry: Rectangle,
        attributes: WindowAttributes,
    ) -> Result<Window>;
    /// Destroy a window
    fn destroy_window(&mut self, window: Window) -> Result<()>;
    /// Map a window
    fn map_window(&mut self, window: Window) -> Result<()>;
    /// Unmap a window
    fn unmap_window(&mut self, window: Window) -> Result<()>;
    /// Replace the core event selection of a window
    fn select_input(&mut self, window: Window, mask: EventMask) -> Result<()>;

    /// Current owner of a selection, `NONE` if unowned
    fn selection_owner(&mut self, selection: Atom) -> Result<Window>;
    /// Make `owner` (`NONE` to disown) the owner of `selection`
    fn set_selection_owner(&mut self, owner: Window, selection: Atom, time: Timestamp)
        -> Result<()>;
    /// Ask for XFIXES owner change notifications of `selection` on `window`
    fn select_selection_input(&mut self, window: Window, selection: Atom) -> Result<()>;

    /// Grab the server
    fn grab_server(&mut self) -> Result<()>;
    /// Release the server
    fn ungrab_server(&mut self) -> Result<()>;
    /// Ring the bell
    fn bell(&mut self, percent: i8) -> Result<()>;

    /// Current server time, obtained with a zero-length append to `property`
    /// on `window`. `window` must select `PropertyChange`.
    fn server_time(&mut self, window: Window, property: Atom) -> Result<Timestamp>;
    /// Subtract `repair` from a damage object
    fn damage_subtract(&mut self, damage: Xid, repair: Rectangle) -> Result<()>;
    /// Create an XSync counter starting at `value`
    fn create_counter(&mut self, value: i64) -> Result<Xid>;
    /// Set an XSync counter
    fn set_counter(&mut self, counter: Xid, value: i64) -> Result<()>;

    /// Detect the extensions used by the display
    fn query_extensions(&mut self) -> Result<Extensions>;

    /// Let the client library read from a secondary connection
    fn process_internal_connection(&mut self, fd: RawFd);
    /// Secondary connections opened or closed since the last call
    fn take_connection_changes(&mut self) -> Vec<ConnectionChange>;
}

// ============================ X11Transport ==========================

/// [`Transport`] backed by `x11rb`
pub struct X11Transport {
    conn:           RustConnection,
    screen_num:     usize,
    display_name:   String,
    /// Full sequence number of the last request sent
    last_sent:      u64,
    /// Full sequence number of the last reply, event or error read
    last_processed: u64,
    /// Events read while waiting for something else
    pending:        VecDeque<XEvent>,
    synchronous:    bool,
}

impl std::fmt::Debug for X11Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X11Transport")
            .field("display_name", &self.display_name)
            .field("screen_num", &self.screen_num)
            .field("last_sent", &self.last_sent)
            .field("last_processed", &self.last_processed)
            .finish()
    }
}

impl X11Transport {
    /// Connect to `display_name`, or `$DISPLAY` when `None`
    pub fn connect(display_name: Option<&str>) -> Result<Self> {
        let (conn, screen_num) = RustConnection::connect(display_name)?;
        let name = display_name
            .map(ToOwned::to_owned)
            .or_else(|| std::env::var("DISPLAY").ok())
            .unwrap_or_default();

        log::debug!("connected to display {:?}, screen {}", name, screen_num);

        Ok(Self {
            conn,
            screen_num,
            display_name: name,
            last_sent: 0,
            last_processed: 0,
            pending: VecDeque::new(),
            synchronous: false,
        })
    }

    /// Record that a request with sequence `seq` was sent
    fn sent(&mut self, seq: u64) -> Result<()> {
        self.last_sent = self.last_sent.max(seq);
        if self.synchronous {
            self.sync()?;
        }
        Ok(())
    }

    /// Record that everything up to `seq` was processed
    fn processed(&mut self, seq: u64) {
        self.last_processed = self.last_processed.max(seq);
    }

    /// Finish a request that has a reply
    fn finish<R>(&mut self, seq: u64, reply: Result<R, ReplyError>) -> Result<R> {
        self.last_sent = self.last_sent.max(seq);
        self.processed(seq);
        reply.map_err(|e| match Error::from(e) {
            Error::Request(mut x) => {
                x.serial = seq as Serial;
                Error::Request(x)
            },
            other => other,
        })
    }

    /// Read one event from the connection, either waiting for it or not
    fn read_event(&mut self, block: bool) -> Result<Option<XEvent>> {
        let next = if block {
            Some(self.conn.wait_for_event_with_sequence()?)
        } else {
            self.conn.poll_for_event_with_sequence()?
        };

        Ok(next.map(|(event, seq)| {
            self.processed(seq);
            convert_event(event, seq as Serial)
        }))
    }

    /// Negotiate one extension's version, `None` if it is missing
    fn negotiate<F>(&mut self, name: &'static str, query: F) -> Result<Option<ExtensionVersion>>
    where
        F: FnOnce(&RustConnection) -> Result<(u64, Result<(u32, u32), ReplyError>)>,
    {
        let info = match self.conn.extension_information(name)? {
            Some(info) => info,
            None => {
                log::debug!("extension {} is not present", name);
                return Ok(None);
            },
        };

        let (seq, version) = query(&self.conn)?;
        match self.finish(seq, version) {
            Ok(version) => {
                log::debug!("extension {} version {}.{}", name, version.0, version.1);
                Ok(Some(ExtensionVersion {
                    major_opcode: info.major_opcode,
                    first_event: info.first_event,
                    version,
                }))
            },
            Err(Error::Request(e)) => {
                log::warn!("failed to negotiate {}: error {}", name, e.error_code);
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }
}

/// Run a request without a reply and hand back its sequence number. The
/// cookie is dropped right away so an error shows up as an event.
macro_rules! void_request {
    ($self:ident, $req:expr) => {{
        let seq = { $req?.sequence_number() };
        $self.sent(seq)
    }};
}

impl Transport for X11Transport {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn default_screen(&self) -> usize {
        self.screen_num
    }

    fn screens(&self) -> Vec<ScreenInfo> {
        self.conn
            .setup()
            .roots
            .iter()
            .map(|s| ScreenInfo {
                root:   s.root,
                width:  i32::from(s.width_in_pixels),
                height: i32::from(s.height_in_pixels),
            })
            .collect()
    }

    fn raw_fd(&self) -> Option<RawFd> {
        use std::os::unix::io::AsRawFd;
        Some(self.conn.stream().as_raw_fd())
    }

    fn next_request(&self) -> Serial {
        (self.last_sent + 1) as Serial
    }

    fn last_processed(&self) -> Serial {
        self.last_processed as Serial
    }

    fn set_synchronous(&mut self, synchronous: bool) {
        log::debug!("synchronous mode: {}", synchronous);
        self.synchronous = synchronous;
    }

    fn flush(&mut self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        let cookie = self.conn.get_input_focus()?;
        let seq = cookie.sequence_number();
        let reply = cookie.reply();
        self.finish(seq, reply).map(|_| ())
    }

    fn poll_event(&mut self) -> Result<Option<XEvent>> {
        if let Some(ev) = self.pending.pop_front() {
            return Ok(Some(ev));
        }
        self.read_event(false)
    }

    fn has_pending(&mut self) -> Result<bool> {
        if self.pending.is_empty() {
            if let Some(ev) = self.read_event(false)? {
                self.pending.push_back(ev);
            }
        }
        Ok(!self.pending.is_empty())
    }

    fn drain_errors(&mut self) -> Result<Vec<XError>> {
        let mut errors = Vec::new();
        let mut keep = VecDeque::with_capacity(self.pending.len());

        for ev in self.pending.drain(..) {
            match ev.kind {
                XEventKind::Error(e) => errors.push(e),
                _ => keep.push_back(ev),
            }
        }
        while let Some(ev) = self.read_event(false)? {
            match ev.kind {
                XEventKind::Error(e) => errors.push(e),
                _ => keep.push_back(ev),
            }
        }

        self.pending = keep;
        Ok(errors)
    }

    fn intern_atoms(&mut self, names: &[&str]) -> Result<Vec<Atom>> {
        let cookies = names
            .iter()
            .map(|name| self.conn.intern_atom(false, name.as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;
        // Replies are read before `finish` needs the transport mutably
        let replies = cookies
            .into_iter()
            .map(|cookie| (cookie.sequence_number(), cookie.reply()))
            .collect::<Vec<_>>();

        let mut atoms = Vec::with_capacity(replies.len());
        for (seq, reply) in replies {
            atoms.push(self.finish(seq, reply)?.atom);
        }
        Ok(atoms)
    }

    fn atom_name(&mut self, atom: Atom) -> Result<String> {
        let cookie = self.conn.get_atom_name(atom)?;
        let seq = cookie.sequence_number();
        let reply = cookie.reply();
        let reply = self.finish(seq, reply)?;
        Ok(String::from_utf8_lossy(&reply.name).into_owned())
    }

    fn get_property(
        &mut self,
        window: Window,
        property: Atom,
        type_: Atom,
    ) -> Result<PropertyReply> {
        let type_ = if type_ == NONE { AtomEnum::ANY.into() } else { type_ };
        let cookie = self
            .conn
            .get_property(false, window, property, type_, 0, u32::MAX)?;
        let seq = cookie.sequence_number();
        let reply = cookie.reply();
        let reply = self.finish(seq, reply)?;

        Ok(PropertyReply {
            type_:  reply.type_,
            format: reply.format,
            data:   reply.value,
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
        let len = match format {
            32 => data.len() / 4,
            16 => data.len() / 2,
            _ => data.len(),
        } as u32;
        void_request!(
            self,
            self.conn
                .change_property(mode, window, property, type_, format, len, data)
        )
    }

    fn delete_property(&mut self, window: Window, property: Atom) -> Result<()> {
        void_request!(self, self.conn.delete_property(window, property))
    }

    fn translate_coordinates(
        &mut self,
        src: Window,
        dst: Window,
        x: i16,
        y: i16,
    ) -> Result<(i32, i32)> {
        let cookie = self.conn.translate_coordinates(src, dst, x, y)?;
        let seq = cookie.sequence_number();
        let reply = cookie.reply();
        let reply = self.finish(seq, reply)?;
        Ok((i32::from(reply.dst_x), i32::from(reply.dst_y)))
    }

    fn send_client_message(
        &mut self,
        destination: Window,
        propagate: bool,
        mask: EventMask,
        message: ClientMessageEvent,
    ) -> Result<()> {
        let event = xproto::ClientMessageEvent::from(message);
        void_request!(self, self.conn.send_event(propagate, destination, mask, event))
    }

    fn set_input_focus(&mut self, window: Window, time: Timestamp) -> Result<()> {
        void_request!(self, self.conn.set_input_focus(InputFocus::PARENT, window, time))
    }

    fn query_pointer(&mut self, window: Window) -> Result<(i32, i32)> {
        let cookie = self.conn.query_pointer(window)?;
        let seq = cookie.sequence_number();
        let reply = cookie.reply();
        let reply = self.finish(seq, reply)?;
        Ok((i32::from(reply.root_x), i32::from(reply.root_y)))
    }

    fn create_window(
        &mut self,
        parent: Window,
        geometry: Rectangle,
        attributes: WindowAttributes,
    ) -> Result<Window> {
        let id = self.conn.generate_id().map_err(Error::from)?;
        let aux = CreateWindowAux::new()
            .override_redirect(u32::from(attributes.override_redirect))
            .event_mask(attributes.event_mask);
        let class = if attributes.input_only {
            WindowClass::INPUT_ONLY
        } else {
            WindowClass::INPUT_OUTPUT
        };

        void_request!(
            self,
            self.conn.create_window(
                COPY_DEPTH_FROM_PARENT,
                id,
                parent,
                geometry.x() as i16,
                geometry.y() as i16,
                geometry.width() as u16,
                geometry.height() as u16,
                0,
                class,
                COPY_FROM_PARENT,
                &aux,
            )
        )?;
        Ok(id)
    }

    fn destroy_window(&mut self, window: Window) -> Result<()> {
        void_request!(self, self.conn.destroy_window(window))
    }

    fn map_window(&mut self, window: Window) -> Result<()> {
        void_request!(self, self.conn.map_window(window))
    }

    fn unmap_window(&mut self, window: Window) -> Result<()> {
        void_request!(self, self.conn.unmap_window(window))
    }

    fn select_input(&mut self, window: Window, mask: EventMask) -> Result<()> {
        void_request!(
            self,
            self.conn.change_window_attributes(
                window,
                &ChangeWindowAttributesAux::new().event_mask(mask)
            )
        )
    }

    fn selection_owner(&mut self, selection: Atom) -> Result<Window> {
        let cookie = self.conn.get_selection_owner(selection)?;
        let seq = cookie.sequence_number();
        let reply = cookie.reply();
        Ok(self.finish(seq, reply)?.owner)
    }

    fn set_selection_owner(
        &mut self,
        owner: Window,
        selection: Atom,
        time: Timestamp,
    ) -> Result<()> {
        void_request!(self, self.conn.set_selection_owner(owner, selection, time))
    }

    fn select_selection_input(&mut self, window: Window, selection: Atom) -> Result<()> {
        let mask = xfixes::SelectionEventMask::SET_SELECTION_OWNER
            | xfixes::SelectionEventMask::SELECTION_WINDOW_DESTROY
            | xfixes::SelectionEventMask::SELECTION_CLIENT_CLOSE;
        void_request!(
            self,
            self.conn.xfixes_select_selection_input(window, selection, mask)
        )
    }

    fn grab_server(&mut self) -> Result<()> {
        void_request!(self, self.conn.grab_server())
    }

    fn ungrab_server(&mut self) -> Result<()> {
        void_request!(self, self.conn.ungrab_server())
    }

    fn bell(&mut self, percent: i8) -> Result<()> {
        void_request!(self, self.conn.bell(percent))
    }

    fn server_time(&mut self, window: Window, property: Atom) -> Result<Timestamp> {
        void_request!(
            self,
            self.conn.change_property8(
                PropMode::APPEND,
                window,
                property,
                AtomEnum::STRING,
                &[]
            )
        )?;
        self.conn.flush()?;

        loop {
            let ev = self
                .read_event(true)?
                .ok_or(Error::Closed)?;
            match ev.kind {
                XEventKind::PropertyNotify(p) if p.window == window && p.atom == property => {
                    return Ok(p.time);
                },
                _ => self.pending.push_back(ev),
            }
        }
    }

    fn damage_subtract(&mut self, damage: Xid, repair: Rectangle) -> Result<()> {
        let region = self.conn.generate_id().map_err(Error::from)?;
        let rect = xproto::Rectangle {
            x:      repair.x() as i16,
            y:      repair.y() as i16,
            width:  repair.width() as u16,
            height: repair.height() as u16,
        };

        void_request!(self, self.conn.xfixes_create_region(region, &[rect]))?;
        void_request!(self, self.conn.damage_subtract(damage, region, x11rb::NONE))?;
        void_request!(self, self.conn.xfixes_destroy_region(region))
    }

    fn create_counter(&mut self, value: i64) -> Result<Xid> {
        let counter = self.conn.generate_id().map_err(Error::from)?;
        void_request!(self, self.conn.sync_create_counter(counter, sync_value(value)))?;
        Ok(counter)
    }

    fn set_counter(&mut self, counter: Xid, value: i64) -> Result<()> {
        void_request!(self, self.conn.sync_set_counter(counter, sync_value(value)))
    }

    fn query_extensions(&mut self) -> Result<Extensions> {
        let randr = self.negotiate("RANDR", |c| {
            let cookie = c.randr_query_version(1, 5)?;
            let seq = cookie.sequence_number();
            Ok((seq, cookie.reply().map(|r| (r.major_version, r.minor_version))))
        })?;
        let xfixes = self.negotiate(xfixes::X11_EXTENSION_NAME, |c| {
            let cookie = c.xfixes_query_version(5, 0)?;
            let seq = cookie.sequence_number();
            Ok((seq, cookie.reply().map(|r| (r.major_version, r.minor_version))))
        })?;
        let composite = self.negotiate("Composite", |c| {
            let cookie = c.composite_query_version(0, 4)?;
            let seq = cookie.sequence_number();
            Ok((seq, cookie.reply().map(|r| (r.major_version, r.minor_version))))
        })?;
        let damage = self.negotiate(damage::X11_EXTENSION_NAME, |c| {
            let cookie = c.damage_query_version(1, 1)?;
            let seq = cookie.sequence_number();
            Ok((seq, cookie.reply().map(|r| (r.major_version, r.minor_version))))
        })?;
        let shape = self.negotiate("SHAPE", |c| {
            let cookie = c.shape_query_version()?;
            let seq = cookie.sequence_number();
            Ok((
                seq,
                cookie
                    .reply()
                    .map(|r| (u32::from(r.major_version), u32::from(r.minor_version))),
            ))
        })?;
        let xkb = self.negotiate("XKEYBOARD", |c| {
            let cookie = c.xkb_use_extension(1, 0)?;
            let seq = cookie.sequence_number();
            Ok((
                seq,
                cookie.reply().map(|r| {
                    if r.supported {
                        (u32::from(r.server_major), u32::from(r.server_minor))
                    } else {
                        (0, 0)
                    }
                }),
            ))
        })?
        .filter(|x| x.version.0 > 0);
        let sync = self.negotiate(sync::X11_EXTENSION_NAME, |c| {
            let cookie = c.sync_initialize(3, 1)?;
            let seq = cookie.sequence_number();
            Ok((
                seq,
                cookie
                    .reply()
                    .map(|r| (u32::from(r.major_version), u32::from(r.minor_version))),
            ))
        })?;

        Ok(Extensions {
            randr,
            xfixes,
            composite,
            damage,
            shape,
            xkb,
            sync,
        })
    }

    // `RustConnection` talks to the server over its one stream and never opens
    // internal connections, so only the primary fd from `raw_fd` is watched.
    fn process_internal_connection(&mut self, fd: RawFd) {
        log::warn!("fd {} is not an internal connection of this transport", fd);
    }

    fn take_connection_changes(&mut self) -> Vec<ConnectionChange> {
        Vec::new()
    }
}

/// Split a counter value into the wire representation
const fn sync_value(value: i64) -> sync::Int64 {
    sync::Int64 {
        hi: (value >> 32) as i32,
        lo: value as u32,
    }
}

// ========================== Event conversion ========================

/// Decode an `x11rb` event into an [`XEvent`]
fn convert_event(event: Event, serial: Serial) -> XEvent {
    let send_event = event.raw_response_type() & 0x80 != 0;

    let kind = match event {
        Event::Error(e) => XEventKind::Error(XError {
            serial,
            error_code: e.error_code,
            request_code: e.major_opcode,
            minor_code: e.minor_opcode,
            resource_id: e.bad_value,
            extension: e.extension_name,
        }),
        Event::Expose(e) => XEventKind::Expose(ExposeEvent {
            window: e.window,
            area:   Rectangle::new(
                i32::from(e.x),
                i32::from(e.y),
                i32::from(e.width),
                i32::from(e.height),
            ),
            count:  e.count,
        }),
        Event::GraphicsExposure(e) => XEventKind::GraphicsExpose(ExposeEvent {
            window: e.drawable,
            area:   Rectangle::new(
                i32::from(e.x),
                i32::from(e.y),
                i32::from(e.width),
                i32::from(e.height),
            ),
            count:  e.count,
        }),
        Event::NoExposure(e) => XEventKind::NoExpose(e.drawable),
        Event::VisibilityNotify(e) => XEventKind::VisibilityNotify(
            e.window,
            match e.state {
                xproto::Visibility::UNOBSCURED => Visibility::Unobscured,
                xproto::Visibility::PARTIALLY_OBSCURED => Visibility::PartiallyObscured,
                _ => Visibility::FullyObscured,
            },
        ),
        Event::CreateNotify(e) => XEventKind::CreateNotify(e.parent, e.window),
        Event::DestroyNotify(e) => XEventKind::DestroyNotify(e.event, e.window),
        Event::UnmapNotify(e) => XEventKind::UnmapNotify(e.event, e.window),
        Event::MapNotify(e) => XEventKind::MapNotify(e.event, e.window),
        Event::ReparentNotify(e) => XEventKind::ReparentNotify(ReparentEvent {
            event:             e.event,
            window:            e.window,
            parent:            e.parent,
            override_redirect: e.override_redirect,
        }),
        Event::ConfigureNotify(e) => XEventKind::ConfigureNotify(ConfigureEvent {
            event:             e.event,
            window:            e.window,
            geometry:          Rectangle::new(
                i32::from(e.x),
                i32::from(e.y),
                i32::from(e.width),
                i32::from(e.height),
            ),
            border_width:      e.border_width,
            override_redirect: e.override_redirect,
        }),
        Event::GravityNotify(e) => XEventKind::GravityNotify(e.event, e.window),
        Event::CirculateNotify(e) => XEventKind::CirculateNotify(e.event, e.window),
        Event::PropertyNotify(e) => XEventKind::PropertyNotify(PropertyEvent {
            window:  e.window,
            atom:    e.atom,
            time:    e.time,
            deleted: e.state == xproto::Property::DELETE,
        }),
        Event::SelectionClear(e) => XEventKind::SelectionClear(SelectionEvent {
            window:    e.owner,
            requestor: NONE,
            selection: e.selection,
            target:    NONE,
            property:  NONE,
            time:      e.time,
        }),
        Event::SelectionRequest(e) => XEventKind::SelectionRequest(SelectionEvent {
            window:    e.owner,
            requestor: e.requestor,
            selection: e.selection,
            target:    e.target,
            property:  e.property,
            time:      e.time,
        }),
        Event::SelectionNotify(e) => XEventKind::SelectionNotify(SelectionEvent {
            window:    e.requestor,
            requestor: e.requestor,
            selection: e.selection,
            target:    e.target,
            property:  e.property,
            time:      e.time,
        }),
        Event::ColormapNotify(e) => XEventKind::ColormapNotify(e.window),
        Event::ClientMessage(e) => {
            let data = match e.format {
                8 => ClientMessageData::U8(e.data.as_data8()),
                16 => ClientMessageData::U16(e.data.as_data16()),
                _ => ClientMessageData::U32(e.data.as_data32()),
            };
            XEventKind::ClientMessage(ClientMessageEvent {
                window: e.window,
                type_: e.type_,
                data,
            })
        },
        Event::MappingNotify(_) => XEventKind::MappingNotify,
        Event::KeymapNotify(_) => XEventKind::KeymapNotify,
        Event::XfixesSelectionNotify(e) => XEventKind::SelectionOwnerNotify(OwnerChangeEvent {
            window:         e.window,
            owner:          e.owner,
            selection:      e.selection,
            reason:         match e.subtype {
                xfixes::SelectionEvent::SELECTION_WINDOW_DESTROY => OwnerChangeReason::Destroy,
                xfixes::SelectionEvent::SELECTION_CLIENT_CLOSE => OwnerChangeReason::Close,
                _ => OwnerChangeReason::NewOwner,
            },
            time:           e.timestamp,
            selection_time: e.selection_timestamp,
        }),
        Event::RandrScreenChangeNotify(e) => XEventKind::RandrScreenChange(
            e.root,
            Dimension::new(i32::from(e.width), i32::from(e.height)),
        ),
        Event::RandrNotify(_) => XEventKind::RandrNotify,
        Event::DamageNotify(e) => XEventKind::DamageNotify(DamageEvent {
            drawable: e.drawable,
            damage:   e.damage,
            area:     Rectangle::from(e.area),
        }),
        Event::XkbNewKeyboardNotify(_) => XEventKind::XkbNewKeyboard,
        Event::XkbMapNotify(_) => XEventKind::XkbMap,
        Event::XkbStateNotify(e) => XEventKind::XkbState(XkbStateEvent {
            mods:  u16::from(e.mods),
            group: u8::from(e.group),
        }),
        other => XEventKind::Unknown(other.raw_response_type() & 0x7f, None),
    };

    XEvent {
        serial,
        send_event,
        kind,
    }
}
