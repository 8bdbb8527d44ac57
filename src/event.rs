//! Toolkit events produced by translating [`XEvent`](crate::x::event::XEvent)s

use crate::{
    core::{Atom, Serial, Timestamp},
    geometry::Rectangle,
    toplevel::WindowState,
    window::WindowId,
    x::event::{OwnerChangeReason, Visibility},
};
use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Toolkit-level event selection of a window
    #[derive(Default)]
    pub struct EventMask: u32 {
        const EXPOSURE          = 1 << 1;
        const POINTER_MOTION    = 1 << 2;
        const BUTTON_PRESS      = 1 << 8;
        const BUTTON_RELEASE    = 1 << 9;
        const KEY_PRESS         = 1 << 10;
        const KEY_RELEASE       = 1 << 11;
        const ENTER_NOTIFY      = 1 << 12;
        const LEAVE_NOTIFY      = 1 << 13;
        const FOCUS_CHANGE      = 1 << 14;
        const STRUCTURE         = 1 << 15;
        const PROPERTY_CHANGE   = 1 << 16;
        const VISIBILITY_NOTIFY = 1 << 17;
        const SUBSTRUCTURE      = 1 << 20;
        const SCROLL            = 1 << 21;
    }
}

/// Whether a property changed or was removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyState {
    /// The property has a new value
    NewValue,
    /// The property was deleted
    Delete,
}

/// Payload of a toolkit [`Event`]
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Placeholder for an event nothing has been filled into yet
    Nothing,
    /// The window manager asks the window to close
    Delete,
    /// The window was destroyed
    Destroy,
    /// Part of the window needs repainting (logical pixels)
    Expose {
        /// The area to repaint
        area:  Rectangle,
        /// Number of expose events that follow
        count: u16,
    },
    /// The window was mapped
    Map,
    /// The window was unmapped
    Unmap,
    /// The window moved or was resized (logical pixels, root relative
    /// position for toplevels)
    Configure {
        /// Left edge
        x:      i32,
        /// Top edge
        y:      i32,
        /// New width
        width:  i32,
        /// New height
        height: i32,
    },
    /// A property changed
    Property {
        /// The property
        atom:  Atom,
        /// Server time of the change
        time:  Timestamp,
        /// What happened
        state: PropertyState,
    },
    /// The window lost a selection
    SelectionClear {
        /// The selection
        selection: Atom,
        /// Server time
        time:      Timestamp,
    },
    /// Another client asks for a selection conversion
    SelectionRequest {
        /// The selection
        selection: Atom,
        /// Requested target
        target:    Atom,
        /// Property to store the result in
        property:  Atom,
        /// The requesting window
        requestor: Option<WindowId>,
        /// Server time
        time:      Timestamp,
    },
    /// A selection conversion finished
    SelectionNotify {
        /// The selection
        selection: Atom,
        /// Converted target
        target:    Atom,
        /// Property holding the result, `NONE` on failure
        property:  Atom,
        /// Server time
        time:      Timestamp,
    },
    /// Ownership of a selection changed
    OwnerChange {
        /// The new owner, if it is known to the display
        owner:          Option<WindowId>,
        /// Why the owner changed
        reason:         OwnerChangeReason,
        /// The selection
        selection:      Atom,
        /// Server time of the change
        time:           Timestamp,
        /// Time the selection was acquired
        selection_time: Timestamp,
    },
    /// Visibility of the window changed
    Visibility(Visibility),
    /// The toplevel state changed
    WindowState {
        /// Bits that changed
        changed:   WindowState,
        /// The new state
        new_state: WindowState,
    },
}

/// An event delivered to the toolkit
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// What happened
    pub kind:       EventKind,
    /// The window it happened to
    pub window:     Option<WindowId>,
    /// The underlying X event was sent by a client
    pub send_event: bool,
    /// Serial of the underlying X event
    pub serial:     Serial,
}

impl Event {
    /// Create an event for `window`
    #[must_use]
    pub const fn new(kind: EventKind, window: Option<WindowId>) -> Self {
        Self {
            kind,
            window,
            send_event: false,
            serial: 0,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nothing => write!(f, "nothing"),
            Self::Delete => write!(f, "delete"),
            Self::Destroy => write!(f, "destroy"),
            Self::Expose { area, count } => write!(f, "expose {} (count {})", area, count),
            Self::Map => write!(f, "map"),
            Self::Unmap => write!(f, "unmap"),
            Self::Configure {
                x,
                y,
                width,
                height,
            } => write!(f, "configure {}x{}+{}+{}", width, height, x, y),
            Self::Property { atom, state, .. } => write!(f, "property {} {:?}", atom, state),
            Self::SelectionClear { selection, .. } => write!(f, "selection-clear {}", selection),
            Self::SelectionRequest { selection, .. } => {
                write!(f, "selection-request {}", selection)
            },
            Self::SelectionNotify { selection, .. } => write!(f, "selection-notify {}", selection),
            Self::OwnerChange {
                selection, reason, ..
            } => write!(f, "owner-change {} {:?}", selection, reason),
            Self::Visibility(v) => write!(f, "visibility {:?}", v),
            Self::WindowState { changed, new_state } => {
                write!(f, "window-state changed={:?} new={:?}", changed, new_state)
            },
        }
    }
}
