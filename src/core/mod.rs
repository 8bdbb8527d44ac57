//! Base types used throughout [`xdpy`]

#![allow(clippy::missing_docs_in_private_items)]

use std::fmt;

// Re-export
pub use x11rb::protocol::xproto::{Atom, Timestamp, Window};

/// Type alias used for syntax compatibility
pub type Xid = u32;

/// Request sequence number as tracked by the client library (wraps at 2^32)
pub type Serial = u32;

/// The `None` resource
pub const NONE: Xid = 0;
/// `CurrentTime` in timestamp fields
pub const CURRENT_TIME: Timestamp = 0;

/// Error code for `Success`
pub const SUCCESS: u8 = 0;
/// Error code for `BadWindow`
pub const BAD_WINDOW: u8 = 3;
/// Error code for `BadMatch`
pub const BAD_MATCH: u8 = 8;
/// Error code for `BadDrawable`
pub const BAD_DRAWABLE: u8 = 9;

/// Desktop value meaning "shown on every workspace"
pub const ALL_DESKTOPS: u32 = 0xFFFF_FFFF;

/// Name reported when no EWMH window manager is running
pub const UNKNOWN_WM_NAME: &str = "unknown";

/// Interval between re-validations of the window manager check window
pub const WM_CHECK_INTERVAL_US: i64 = 15 * 1_000_000;

/// Returns `true` if server time `a` is strictly later than `b`, handling
/// 32-bit wraparound
#[must_use]
pub const fn server_time_is_later(a: Timestamp, b: Timestamp) -> bool {
    (a > b && a - b < u32::MAX / 2) || (a < b && b - a > u32::MAX / 2)
}

/// Compare two serials modulo 2^32. `a` is "before" `b` when the signed
/// difference is negative.
#[must_use]
pub const fn serial_is_before(a: Serial, b: Serial) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

/// Compare two serials modulo 2^32, `a >= b`
#[must_use]
pub const fn serial_is_at_or_after(a: Serial, b: Serial) -> bool {
    !serial_is_before(a, b)
}

// ============================ WindowKind ============================

/// Role of a window known to the toolkit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    /// The root window of a screen
    Root,
    /// A top-level managed by the window manager
    Toplevel,
    /// A child window inside another toolkit window
    Child,
    /// A popup that bypasses the window manager
    Temp,
    /// A window created by another client
    Foreign,
}

impl WindowKind {
    /// Returns `true` for kinds that carry top-level state
    #[must_use]
    pub const fn is_toplevel(self) -> bool {
        matches!(self, Self::Toplevel | Self::Temp | Self::Foreign)
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "root"),
            Self::Toplevel => write!(f, "toplevel"),
            Self::Child => write!(f, "child"),
            Self::Temp => write!(f, "temp"),
            Self::Foreign => write!(f, "foreign"),
        }
    }
}

// ============================= Handles ==============================

/// Handle returned when registering an observer callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverHandle(pub(crate) u64);

/// Handle returned when installing an event filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterHandle(pub(crate) u64);
