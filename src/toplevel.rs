//! Toplevel window state as published by the window manager.
//!
//! The window manager describes a toplevel through `_NET_WM_STATE`,
//! `_NET_WM_DESKTOP` and `_CTK_EDGE_CONSTRAINTS`. Whenever one of them
//! changes, the properties are re-read and the resulting [`WindowState`] is
//! compared to the published one. The difference is applied in one step.

use crate::{
    core::{Atom, Serial, Timestamp, Window, ALL_DESKTOPS, NONE},
    frame_clock::FrameClock,
    x::atoms::{AtomCache, KnownAtom},
};
use bitflags::bitflags;
use itertools::Itertools;
use maplit::hashmap;
use std::collections::HashMap;

bitflags! {
    /// State of a toplevel window
    #[derive(Default)]
    pub struct WindowState: u32 {
        const WITHDRAWN        = 1 << 0;
        const ICONIFIED        = 1 << 1;
        const MAXIMIZED        = 1 << 2;
        const STICKY           = 1 << 3;
        const FULLSCREEN       = 1 << 4;
        const ABOVE            = 1 << 5;
        const BELOW            = 1 << 6;
        const FOCUSED          = 1 << 7;
        const TILED            = 1 << 8;
        const TOP_TILED        = 1 << 9;
        const TOP_RESIZABLE    = 1 << 10;
        const RIGHT_TILED      = 1 << 11;
        const RIGHT_RESIZABLE  = 1 << 12;
        const BOTTOM_TILED     = 1 << 13;
        const BOTTOM_RESIZABLE = 1 << 14;
        const LEFT_TILED       = 1 << 15;
        const LEFT_RESIZABLE   = 1 << 16;

        /// Every per-edge bit
        const EDGE_CONSTRAINTS = Self::TOP_TILED.bits | Self::TOP_RESIZABLE.bits
            | Self::RIGHT_TILED.bits | Self::RIGHT_RESIZABLE.bits
            | Self::BOTTOM_TILED.bits | Self::BOTTOM_RESIZABLE.bits
            | Self::LEFT_TILED.bits | Self::LEFT_RESIZABLE.bits;
        /// Per-edge tiled bits
        const ANY_EDGE_TILED = Self::TOP_TILED.bits | Self::RIGHT_TILED.bits
            | Self::BOTTOM_TILED.bits | Self::LEFT_TILED.bits;
        /// Bits derived from the window manager's properties
        const WM_MANAGED = Self::ICONIFIED.bits | Self::MAXIMIZED.bits | Self::STICKY.bits
            | Self::FULLSCREEN.bits | Self::FOCUSED.bits | Self::TILED.bits
            | Self::EDGE_CONSTRAINTS.bits;
    }
}

/// `_CTK_EDGE_CONSTRAINTS` packs the per-edge bits starting at bit 0; they
/// are stored shifted into [`WindowState`] position.
pub const EDGE_CONSTRAINTS_SHIFT: u32 = 9;

impl WindowState {
    /// Convert to a `HashMap` of names and whether they are set
    #[must_use]
    pub fn to_hashmap(self) -> HashMap<&'static str, bool> {
        hashmap! {
            "withdrawn" => self.contains(Self::WITHDRAWN),
            "iconified" => self.contains(Self::ICONIFIED),
            "maximized" => self.contains(Self::MAXIMIZED),
            "sticky" => self.contains(Self::STICKY),
            "fullscreen" => self.contains(Self::FULLSCREEN),
            "focused" => self.contains(Self::FOCUSED),
            "tiled" => self.contains(Self::TILED),
        }
    }

    /// Names of the set states joined with `|`, e.g. `focused|maximized`
    #[must_use]
    pub fn describe(self) -> String {
        self.to_hashmap()
            .into_iter()
            .filter_map(|(name, set)| set.then(|| name))
            .sorted()
            .join("|")
    }
}

// =========================== WmStateFlags ===========================

/// Which `_NET_WM_STATE` atoms are present on a toplevel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WmStateFlags {
    pub sticky:     bool,
    pub maxvert:    bool,
    pub maxhorz:    bool,
    pub fullscreen: bool,
    pub focused:    bool,
    pub hidden:     bool,
}

impl WmStateFlags {
    /// Scan a `_NET_WM_STATE` value
    #[must_use]
    pub fn from_atoms(atoms: &AtomCache, list: &[Atom]) -> Self {
        let has = |known: KnownAtom| {
            let atom = atoms.get(known);
            atom != NONE && list.contains(&atom)
        };

        Self {
            sticky:     has(KnownAtom::NetWmStateSticky),
            maxvert:    has(KnownAtom::NetWmStateMaximizedVert),
            maxhorz:    has(KnownAtom::NetWmStateMaximizedHorz),
            fullscreen: has(KnownAtom::NetWmStateFullscreen),
            focused:    has(KnownAtom::NetWmStateFocused),
            hidden:     has(KnownAtom::NetWmStateHidden),
        }
    }
}

/// Decides whether a toplevel is tiled when the window manager does not
/// publish `_CTK_EDGE_CONSTRAINTS`
pub type TiledFallback = fn(&WmStateFlags) -> bool;

/// Window managers without edge constraints tile by maximizing vertically only
#[must_use]
pub const fn vertical_maximize_is_tiled(flags: &WmStateFlags) -> bool {
    flags.maxvert && !flags.maxhorz
}

/// Hints the window manager supports that change how state is derived
#[derive(Debug, Clone, Copy)]
pub struct StateSupport {
    /// `_NET_WM_STATE_FOCUSED` is in `_NET_SUPPORTED`
    pub focused_hint:          bool,
    /// `_CTK_EDGE_CONSTRAINTS` is in `_NET_SUPPORTED`
    pub edge_constraints_hint: bool,
    /// Tiling rule used without edge constraints
    pub tiled_fallback:        TiledFallback,
}

impl Default for StateSupport {
    fn default() -> Self {
        Self {
            focused_hint:          false,
            edge_constraints_hint: false,
            tiled_fallback:        vertical_maximize_is_tiled,
        }
    }
}

/// The state the window manager's properties describe
#[must_use]
pub fn desired_state(
    flags: &WmStateFlags,
    on_all_desktops: bool,
    edge_constraints: u32,
    support: &StateSupport,
) -> WindowState {
    let mut state = WindowState::empty();
    let edges = WindowState::from_bits_truncate(edge_constraints) & WindowState::EDGE_CONSTRAINTS;

    state.set(WindowState::STICKY, flags.sticky && on_all_desktops);
    state.set(WindowState::MAXIMIZED, flags.maxvert && flags.maxhorz);
    state.set(WindowState::FULLSCREEN, flags.fullscreen);
    state.set(WindowState::FOCUSED, flags.focused || !support.focused_hint);
    state.set(WindowState::ICONIFIED, flags.hidden);

    let tiled = if support.edge_constraints_hint {
        edges.intersects(WindowState::ANY_EDGE_TILED)
    } else {
        (support.tiled_fallback)(flags)
    };
    state.set(WindowState::TILED, tiled);
    state.insert(edges);

    state
}

/// Bits to `(unset, set)` to move `old` to what the properties describe.
/// Bits outside [`WindowState::WM_MANAGED`] are never touched.
#[must_use]
pub fn state_changes(
    old: WindowState,
    flags: &WmStateFlags,
    on_all_desktops: bool,
    edge_constraints: u32,
    support: &StateSupport,
) -> (WindowState, WindowState) {
    let desired = desired_state(flags, on_all_desktops, edge_constraints, support)
        & WindowState::WM_MANAGED;
    let current = old & WindowState::WM_MANAGED;

    (current - desired, desired - current)
}

/// Decode `_NET_WM_DESKTOP`
#[must_use]
pub const fn is_all_desktops(desktop: Option<u32>) -> bool {
    matches!(desktop, Some(ALL_DESKTOPS))
}

/// Decode `_CTK_EDGE_CONSTRAINTS` into [`WindowState`] bit positions
#[must_use]
pub const fn shift_edge_constraints(raw: Option<u32>) -> u32 {
    match raw {
        Some(v) => v << EDGE_CONSTRAINTS_SHIFT,
        None => 0,
    }
}

// ============================= Toplevel =============================

/// Bookkeeping for a toplevel window
#[derive(Debug, Clone, Default)]
pub struct Toplevel {
    /// Latest `_NET_WM_STATE` scan
    pub wm_state:                    WmStateFlags,
    /// `_NET_WM_DESKTOP` is "all desktops"
    pub on_all_desktops:             bool,
    /// `_CTK_EDGE_CONSTRAINTS`, shifted into [`WindowState`] positions
    pub edge_constraints:            u32,
    /// Serial of the last map request; older property events are ignored
    pub map_serial:                  Serial,
    /// Window that receives the focus on `WM_TAKE_FOCUS`
    pub focus_window:                Window,
    /// Last user interaction time
    pub user_time:                   Timestamp,

    /// Frame history and freeze count
    pub frame_clock:                 FrameClock,
    /// A frame was sent and the window manager has not reported it drawn yet
    pub frame_pending:               bool,
    /// Earliest time the next frame should be presented
    pub throttled_presentation_time: i64,

    /// `_NET_WM_SYNC_REQUEST_COUNTER` (basic counter)
    pub update_counter:              u32,
    /// Extended sync counter, `0` if the window uses only the basic one
    pub extended_update_counter:     u32,
    /// Value requested by the last `_NET_WM_SYNC_REQUEST`
    pub pending_counter_value:       i64,
    /// The last `_NET_WM_SYNC_REQUEST` was for the extended counter
    pub pending_counter_value_is_extended: bool,
    /// Value to report once the pending configure is handled
    pub configure_counter_value:     i64,
    /// The last sync request was for the extended counter
    pub configure_counter_value_is_extended: bool,
    /// Last value set on the extended counter
    pub current_counter_value:       i64,
}

impl Toplevel {
    /// Create the record for the toplevel `window`
    #[must_use]
    pub fn new(window: Window) -> Self {
        Self {
            focus_window: window,
            ..Self::default()
        }
    }
}
