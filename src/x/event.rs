//! X11 Events, as read off the wire

use crate::{
    core::{Atom, Serial, Timestamp, Window, Xid},
    error::XError,
    geometry::{Dimension, Rectangle},
};
use x11rb::protocol::xproto;

// ============================== XEvent ==============================

/// Low-level wrapper around X-server events
///
/// Translated to toolkit [`Event`](crate::event::Event)s by the registered
/// translators
#[derive(Debug, Clone, PartialEq)]
pub struct XEvent {
    /// Full sequence number of the last request processed by the server
    pub serial:     Serial,
    /// Whether the event was sent by a client with `SendEvent`
    pub send_event: bool,
    /// The decoded payload
    pub kind:       XEventKind,
}

/// Payload of an [`XEvent`]
#[derive(Debug, Clone, PartialEq)]
pub enum XEventKind {
    /// A region of a window needs repainting
    Expose(ExposeEvent),
    /// A region of a drawable was not copied by `CopyArea`
    GraphicsExpose(ExposeEvent),
    /// A `CopyArea` source was fully available
    NoExpose(Window),
    /// The visibility of a window changed
    VisibilityNotify(Window, Visibility),
    /// A window was created
    CreateNotify(Window, Window),
    /// A window was destroyed, `(event, window)`
    DestroyNotify(Window, Window),
    /// A window was unmapped, `(event, window)`
    UnmapNotify(Window, Window),
    /// A window was mapped, `(event, window)`
    MapNotify(Window, Window),
    /// A window was reparented
    ReparentNotify(ReparentEvent),
    /// A window changed its geometry or stacking
    ConfigureNotify(ConfigureEvent),
    /// A window moved because its parent was resized, `(event, window)`
    GravityNotify(Window, Window),
    /// A window was restacked, `(event, window)`
    CirculateNotify(Window, Window),
    /// A window property was changed
    PropertyNotify(PropertyEvent),
    /// Selection ownership was lost
    SelectionClear(SelectionEvent),
    /// A client asks the owner to convert a selection
    SelectionRequest(SelectionEvent),
    /// A selection conversion finished
    SelectionNotify(SelectionEvent),
    /// The colormap of a window changed
    ColormapNotify(Window),
    /// A client message was received
    ClientMessage(ClientMessageEvent),
    /// The keyboard mapping changed
    MappingNotify,
    /// Keymap state after an enter or focus-in
    KeymapNotify,
    /// XFIXES selection owner change
    SelectionOwnerNotify(OwnerChangeEvent),
    /// RANDR screen configuration change on the given root, with the new
    /// size in device pixels
    RandrScreenChange(Window, Dimension),
    /// RANDR crtc/output/property notification
    RandrNotify,
    /// DAMAGE notification for a composited child
    DamageNotify(DamageEvent),
    /// XKB reports a new keyboard
    XkbNewKeyboard,
    /// XKB keymap changed
    XkbMap,
    /// XKB modifier/group state changed
    XkbState(XkbStateEvent),
    /// A protocol error, delivered in-band
    Error(XError),
    /// Unknown event type, used as a catchall for events not tracked here.
    ///
    /// Holds the response type and, for events with the usual layout, the
    /// event window.
    Unknown(u8, Option<Window>),
}

/// Visibility state reported by `VisibilityNotify`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Fully visible
    Unobscured,
    /// Partially covered
    PartiallyObscured,
    /// Fully covered
    FullyObscured,
}

/// Data associated with an expose event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposeEvent {
    /// The window or drawable that needs repainting
    pub window: Window,
    /// The area in device pixels
    pub area:   Rectangle,
    /// Number of expose events that follow for the same window
    pub count:  u16,
}

/// Data associated with a configure event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigureEvent {
    /// The window the event was selected on
    pub event:             Window,
    /// The window that changed
    pub window:            Window,
    /// The new geometry, relative to the parent, in device pixels
    pub geometry:          Rectangle,
    /// Border width
    pub border_width:      u16,
    /// Whether the window is override-redirect
    pub override_redirect: bool,
}

/// Data associated with a reparent event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReparentEvent {
    /// The event window
    pub event:             Window,
    /// The window that was reparented
    pub window:            Window,
    /// The new parent window
    pub parent:            Window,
    /// Whether the child window is override-redirect
    pub override_redirect: bool,
}

/// Data associated with a property change event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyEvent {
    /// The window associated with the event
    pub window:  Window,
    /// The atom representing the change
    pub atom:    Atom,
    /// The time of event
    pub time:    Timestamp,
    /// Whether the property was deleted
    pub deleted: bool,
}

/// Data associated with the core selection events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionEvent {
    /// Owner for clear/request, requestor for notify
    pub window:    Window,
    /// Requesting window, for requests
    pub requestor: Window,
    /// The selection atom
    pub selection: Atom,
    /// Requested conversion target
    pub target:    Atom,
    /// Property the result is stored in
    pub property:  Atom,
    /// Timestamp of the request
    pub time:      Timestamp,
}

/// Data associated with an XFIXES selection owner change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerChangeEvent {
    /// The window that selected the notification
    pub window:         Window,
    /// New owner, `NONE` if the selection has no owner anymore
    pub owner:          Window,
    /// The selection atom
    pub selection:      Atom,
    /// Why the owner changed
    pub reason:         OwnerChangeReason,
    /// Server time of the notification
    pub time:           Timestamp,
    /// Time the selection was acquired
    pub selection_time: Timestamp,
}

/// Cause of an [`OwnerChangeEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerChangeReason {
    /// A client set a new owner
    NewOwner,
    /// The owning window was destroyed
    Destroy,
    /// The owning client closed its connection
    Close,
}

/// Data associated with a damage notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageEvent {
    /// The damaged drawable
    pub drawable: Xid,
    /// The damage object
    pub damage:   Xid,
    /// Damaged area, relative to the drawable, in device pixels
    pub area:     Rectangle,
}

/// Data associated with an XKB state notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XkbStateEvent {
    /// Effective modifiers
    pub mods:  u16,
    /// Effective group
    pub group: u8,
}

/// Data associated with a client message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientMessageEvent {
    /// The window the message is about
    pub window: Window,
    /// The message type
    pub type_:  Atom,
    /// The message payload
    pub data:   ClientMessageData,
}

impl ClientMessageEvent {
    /// Create a new format-32 [`ClientMessageEvent`]
    #[must_use]
    pub const fn new(window: Window, type_: Atom, data: [u32; 5]) -> Self {
        Self {
            window,
            type_,
            data: ClientMessageData::U32(data),
        }
    }

    /// The payload as five 32-bit values, zero for other formats
    #[must_use]
    pub fn data32(&self) -> [u32; 5] {
        match self.data {
            ClientMessageData::U32(d) => d,
            _ => [0; 5],
        }
    }
}

/// The different formats of a Client message's data,
/// as specified by ICCCM.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientMessageData {
    U8([u8; 20]),
    U16([u16; 10]),
    U32([u32; 5]),
}

impl ClientMessageData {
    /// The wire format (8, 16 or 32)
    #[must_use]
    pub const fn format(&self) -> u8 {
        match self {
            Self::U8(_) => 8,
            Self::U16(_) => 16,
            Self::U32(_) => 32,
        }
    }
}

macro_rules! _impl_tryfrom {
    ($t:ty, $count:expr, $variant:expr) => {
        impl TryFrom<&[$t]> for ClientMessageData {
            type Error = std::array::TryFromSliceError;

            fn try_from(data: &[$t]) -> Result<Self, Self::Error> {
                Ok($variant(<[$t; $count]>::try_from(data)?))
            }
        }
    };
}

_impl_tryfrom!(u8, 20, Self::U8);
_impl_tryfrom!(u16, 10, Self::U16);
_impl_tryfrom!(u32, 5, Self::U32);

impl From<ClientMessageEvent> for xproto::ClientMessageEvent {
    fn from(m: ClientMessageEvent) -> Self {
        let data = match m.data {
            ClientMessageData::U8(d) => xproto::ClientMessageData::from(d),
            ClientMessageData::U16(d) => xproto::ClientMessageData::from(d),
            ClientMessageData::U32(d) => xproto::ClientMessageData::from(d),
        };
        Self::new(m.data.format(), m.window, m.type_, data)
    }
}

// ============================ Accessors =============================

impl XEvent {
    /// Create an event that came from the server itself
    #[must_use]
    pub const fn new(serial: Serial, kind: XEventKind) -> Self {
        Self {
            serial,
            send_event: false,
            kind,
        }
    }

    /// The core response type, `0` for errors, `None` for extension events
    #[must_use]
    pub const fn core_code(&self) -> Option<u8> {
        Some(match &self.kind {
            XEventKind::Error(_) => 0,
            XEventKind::Expose(_) => xproto::EXPOSE_EVENT,
            XEventKind::GraphicsExpose(_) => xproto::GRAPHICS_EXPOSURE_EVENT,
            XEventKind::NoExpose(_) => xproto::NO_EXPOSURE_EVENT,
            XEventKind::VisibilityNotify(..) => xproto::VISIBILITY_NOTIFY_EVENT,
            XEventKind::CreateNotify(..) => xproto::CREATE_NOTIFY_EVENT,
            XEventKind::DestroyNotify(..) => xproto::DESTROY_NOTIFY_EVENT,
            XEventKind::UnmapNotify(..) => xproto::UNMAP_NOTIFY_EVENT,
            XEventKind::MapNotify(..) => xproto::MAP_NOTIFY_EVENT,
            XEventKind::ReparentNotify(_) => xproto::REPARENT_NOTIFY_EVENT,
            XEventKind::ConfigureNotify(_) => xproto::CONFIGURE_NOTIFY_EVENT,
            XEventKind::GravityNotify(..) => xproto::GRAVITY_NOTIFY_EVENT,
            XEventKind::CirculateNotify(..) => xproto::CIRCULATE_NOTIFY_EVENT,
            XEventKind::PropertyNotify(_) => xproto::PROPERTY_NOTIFY_EVENT,
            XEventKind::SelectionClear(_) => xproto::SELECTION_CLEAR_EVENT,
            XEventKind::SelectionRequest(_) => xproto::SELECTION_REQUEST_EVENT,
            XEventKind::SelectionNotify(_) => xproto::SELECTION_NOTIFY_EVENT,
            XEventKind::ColormapNotify(_) => xproto::COLORMAP_NOTIFY_EVENT,
            XEventKind::ClientMessage(_) => xproto::CLIENT_MESSAGE_EVENT,
            XEventKind::MappingNotify => xproto::MAPPING_NOTIFY_EVENT,
            XEventKind::KeymapNotify => xproto::KEYMAP_NOTIFY_EVENT,
            XEventKind::Unknown(code, _) if *code < 64 => *code,
            _ => return None,
        })
    }

    /// The window the event was reported on (`xany.window`)
    #[must_use]
    pub const fn event_window(&self) -> Option<Window> {
        Some(match &self.kind {
            XEventKind::Expose(e) | XEventKind::GraphicsExpose(e) => e.window,
            XEventKind::NoExpose(w)
            | XEventKind::VisibilityNotify(w, _)
            | XEventKind::CreateNotify(w, _)
            | XEventKind::DestroyNotify(w, _)
            | XEventKind::UnmapNotify(w, _)
            | XEventKind::MapNotify(w, _)
            | XEventKind::GravityNotify(w, _)
            | XEventKind::CirculateNotify(w, _)
            | XEventKind::ColormapNotify(w)
            | XEventKind::RandrScreenChange(w, _) => *w,
            XEventKind::ReparentNotify(e) => e.event,
            XEventKind::ConfigureNotify(e) => e.event,
            XEventKind::PropertyNotify(e) => e.window,
            XEventKind::SelectionClear(e)
            | XEventKind::SelectionRequest(e)
            | XEventKind::SelectionNotify(e) => e.window,
            XEventKind::ClientMessage(e) => e.window,
            XEventKind::SelectionOwnerNotify(e) => e.window,
            XEventKind::DamageNotify(e) => e.drawable,
            XEventKind::Unknown(_, Some(w)) => *w,
            _ => return None,
        })
    }

    /// The window the event is about. Differs from
    /// [`event_window`](Self::event_window) for structure events received
    /// through a parent's substructure selection.
    #[must_use]
    pub const fn target_window(&self) -> Option<Window> {
        match &self.kind {
            XEventKind::CreateNotify(_, w)
            | XEventKind::DestroyNotify(_, w)
            | XEventKind::UnmapNotify(_, w)
            | XEventKind::MapNotify(_, w)
            | XEventKind::GravityNotify(_, w)
            | XEventKind::CirculateNotify(_, w) => Some(*w),
            XEventKind::ReparentNotify(e) => Some(e.window),
            XEventKind::ConfigureNotify(e) => Some(e.window),
            _ => self.event_window(),
        }
    }

    /// Returns `true` for structure events delivered to a parent
    #[must_use]
    pub fn is_substructure(&self) -> bool {
        match (self.event_window(), self.target_window()) {
            (Some(event), Some(target)) => event != target,
            _ => false,
        }
    }
}

// ========================= Event type registry ======================

/// A block of event codes claimed by an extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTypeRange {
    /// First event code
    pub base:  u8,
    /// Number of codes
    pub count: u8,
}

/// Event codes (core and extension) that the display dispatches by window
#[derive(Debug, Clone, Default)]
pub struct EventTypes {
    ranges: Vec<EventTypeRange>,
}

impl EventTypes {
    /// Create a registry containing the core events
    #[must_use]
    pub fn new() -> Self {
        let mut types = Self::default();
        types.register(xproto::KEY_PRESS_EVENT, xproto::MAPPING_NOTIFY_EVENT - 1);
        types
    }

    /// Claim `count` codes starting at `base`
    pub fn register(&mut self, base: u8, count: u8) {
        log::trace!("registering event types {}..{}", base, u16::from(base) + u16::from(count));
        self.ranges.push(EventTypeRange { base, count });
    }

    /// Returns `true` if `code` falls into a registered block
    #[must_use]
    pub fn contains(&self, code: u8) -> bool {
        let code = code & 0x7f;
        self.ranges
            .iter()
            .any(|r| code >= r.base && u16::from(code) < u16::from(r.base) + u16::from(r.count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substructure_detection() {
        let ev = XEvent::new(1, XEventKind::UnmapNotify(10, 11));
        assert!(ev.is_substructure());
        assert_eq!(ev.event_window(), Some(10));
        assert_eq!(ev.target_window(), Some(11));

        let ev = XEvent::new(1, XEventKind::MapNotify(11, 11));
        assert!(!ev.is_substructure());
    }

    #[test]
    fn client_message_data_from_slice() {
        let data = ClientMessageData::try_from(&[1_u32, 2, 3, 4, 5][..]).unwrap();
        assert_eq!(data.format(), 32);
        assert!(ClientMessageData::try_from(&[1_u32, 2][..]).is_err());
        let msg = ClientMessageEvent { window: 1, type_: 2, data };
        assert_eq!(msg.data32(), [1, 2, 3, 4, 5]);
    }

    #[test]
    fn event_type_registry() {
        let mut types = EventTypes::new();
        assert!(types.contains(xproto::EXPOSE_EVENT));
        assert!(!types.contains(90));
        types.register(89, 2);
        assert!(types.contains(90));
        assert!(!types.contains(91));
    }
}
