//! Bidirectional cache of interned atoms

use crate::{
    core::{Atom, NONE},
    error::{Error, Result},
    x::transport::Transport,
};
use std::collections::HashMap;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, EnumIter, EnumString, IntoStaticStr};
use x11rb::protocol::xproto::AtomEnum;

/// Atoms the display uses by name. All of them are interned in one batch
/// when the display opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumIter, EnumString, IntoStaticStr)]
pub enum KnownAtom {
    #[strum(serialize = "UTF8_STRING")]
    Utf8String,
    #[strum(serialize = "WM_CLIENT_LEADER")]
    WmClientLeader,
    #[strum(serialize = "WM_DELETE_WINDOW")]
    WmDeleteWindow,
    #[strum(serialize = "WM_ICON_NAME")]
    WmIconName,
    #[strum(serialize = "WM_LOCALE_NAME")]
    WmLocaleName,
    #[strum(serialize = "WM_PROTOCOLS")]
    WmProtocols,
    #[strum(serialize = "WM_TAKE_FOCUS")]
    WmTakeFocus,
    #[strum(serialize = "WM_WINDOW_ROLE")]
    WmWindowRole,
    #[strum(serialize = "SM_CLIENT_ID")]
    SmClientId,
    #[strum(serialize = "_NET_ACTIVE_WINDOW")]
    NetActiveWindow,
    #[strum(serialize = "_NET_CURRENT_DESKTOP")]
    NetCurrentDesktop,
    #[strum(serialize = "_NET_FRAME_EXTENTS")]
    NetFrameExtents,
    #[strum(serialize = "_NET_STARTUP_ID")]
    NetStartupId,
    #[strum(serialize = "_NET_STARTUP_INFO")]
    NetStartupInfo,
    #[strum(serialize = "_NET_STARTUP_INFO_BEGIN")]
    NetStartupInfoBegin,
    #[strum(serialize = "_NET_SUPPORTED")]
    NetSupported,
    #[strum(serialize = "_NET_SUPPORTING_WM_CHECK")]
    NetSupportingWmCheck,
    #[strum(serialize = "_NET_WM_CM_S0")]
    NetWmCmS0,
    #[strum(serialize = "_NET_WM_DESKTOP")]
    NetWmDesktop,
    #[strum(serialize = "_NET_WM_FRAME_DRAWN")]
    NetWmFrameDrawn,
    #[strum(serialize = "_NET_WM_FRAME_TIMINGS")]
    NetWmFrameTimings,
    #[strum(serialize = "_NET_WM_NAME")]
    NetWmName,
    #[strum(serialize = "_NET_WM_PID")]
    NetWmPid,
    #[strum(serialize = "_NET_WM_PING")]
    NetWmPing,
    #[strum(serialize = "_NET_WM_STATE")]
    NetWmState,
    #[strum(serialize = "_NET_WM_STATE_ABOVE")]
    NetWmStateAbove,
    #[strum(serialize = "_NET_WM_STATE_BELOW")]
    NetWmStateBelow,
    #[strum(serialize = "_NET_WM_STATE_FOCUSED")]
    NetWmStateFocused,
    #[strum(serialize = "_NET_WM_STATE_FULLSCREEN")]
    NetWmStateFullscreen,
    #[strum(serialize = "_NET_WM_STATE_HIDDEN")]
    NetWmStateHidden,
    #[strum(serialize = "_NET_WM_STATE_MAXIMIZED_HORZ")]
    NetWmStateMaximizedHorz,
    #[strum(serialize = "_NET_WM_STATE_MAXIMIZED_VERT")]
    NetWmStateMaximizedVert,
    #[strum(serialize = "_NET_WM_STATE_MODAL")]
    NetWmStateModal,
    #[strum(serialize = "_NET_WM_STATE_SKIP_PAGER")]
    NetWmStateSkipPager,
    #[strum(serialize = "_NET_WM_STATE_SKIP_TASKBAR")]
    NetWmStateSkipTaskbar,
    #[strum(serialize = "_NET_WM_STATE_STICKY")]
    NetWmStateSticky,
    #[strum(serialize = "_NET_WM_SYNC_REQUEST")]
    NetWmSyncRequest,
    #[strum(serialize = "_NET_WM_SYNC_REQUEST_COUNTER")]
    NetWmSyncRequestCounter,
    #[strum(serialize = "_NET_WM_USER_TIME")]
    NetWmUserTime,
    #[strum(serialize = "_NET_WM_USER_TIME_WINDOW")]
    NetWmUserTimeWindow,
    #[strum(serialize = "_NET_WM_WINDOW_TYPE")]
    NetWmWindowType,
    #[strum(serialize = "_NET_VIRTUAL_ROOTS")]
    NetVirtualRoots,
    #[strum(serialize = "_CTK_EDGE_CONSTRAINTS")]
    EdgeConstraints,
    #[strum(serialize = "_CTK_FRAME_EXTENTS")]
    FrameExtents,
    #[strum(serialize = "XDPY_TIMESTAMP_PROP")]
    TimestampProp,
    #[strum(serialize = "XDPY_SELECTION")]
    Selection,
}

impl KnownAtom {
    /// The atom's name on the server
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// Atoms that are predefined by the core protocol and never need a round trip
pub(crate) const PREDEFINED: &[(&str, AtomEnum)] = &[
    ("PRIMARY", AtomEnum::PRIMARY),
    ("SECONDARY", AtomEnum::SECONDARY),
    ("ATOM", AtomEnum::ATOM),
    ("CARDINAL", AtomEnum::CARDINAL),
    ("INTEGER", AtomEnum::INTEGER),
    ("STRING", AtomEnum::STRING),
    ("WINDOW", AtomEnum::WINDOW),
    ("WM_CLASS", AtomEnum::WM_CLASS),
    ("WM_NAME", AtomEnum::WM_NAME),
    ("WM_HINTS", AtomEnum::WM_HINTS),
    ("WM_NORMAL_HINTS", AtomEnum::WM_NORMAL_HINTS),
    ("WM_TRANSIENT_FOR", AtomEnum::WM_TRANSIENT_FOR),
];

/// Name to atom (and back) lookup shared by the whole display
#[derive(Debug, Clone)]
pub struct AtomCache {
    by_name: HashMap<String, Atom>,
    by_atom: HashMap<Atom, String>,
}

impl Default for AtomCache {
    fn default() -> Self {
        let mut cache = Self {
            by_name: HashMap::new(),
            by_atom: HashMap::new(),
        };
        for (name, atom) in PREDEFINED {
            cache.insert(name, (*atom).into());
        }
        cache
    }
}

impl AtomCache {
    /// Create a cache seeded with the predefined atoms
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a name/atom pair
    pub fn insert(&mut self, name: &str, atom: Atom) {
        self.by_name.insert(name.to_owned(), atom);
        self.by_atom.insert(atom, name.to_owned());
    }

    /// Intern every [`KnownAtom`] in a single batch
    pub fn precache(&mut self, transport: &mut dyn Transport) -> Result<()> {
        let names = KnownAtom::iter()
            .map(KnownAtom::name)
            .filter(|n| !self.by_name.contains_key(*n))
            .collect::<Vec<_>>();

        let atoms = transport.intern_atoms(&names)?;
        for (name, atom) in names.iter().zip(atoms) {
            self.insert(name, atom);
        }

        log::debug!("precached {} atoms", names.len());
        Ok(())
    }

    /// Cached atom for a well known name, `NONE` if it was never interned
    #[must_use]
    pub fn get(&self, known: KnownAtom) -> Atom {
        self.lookup(known.name()).unwrap_or(NONE)
    }

    /// Cached atom for an arbitrary name
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Atom> {
        self.by_name.get(name).copied()
    }

    /// Cached name for an atom
    #[must_use]
    pub fn lookup_name(&self, atom: Atom) -> Option<&str> {
        self.by_atom.get(&atom).map(String::as_str)
    }

    /// Returns the atom for `name`, interning it on a cache miss
    pub fn intern(&mut self, transport: &mut dyn Transport, name: &str) -> Result<Atom> {
        if let Some(atom) = self.lookup(name) {
            return Ok(atom);
        }

        let atom = transport
            .intern_atoms(&[name])?
            .first()
            .copied()
            .ok_or(Error::UnknownAtom(NONE))?;
        self.insert(name, atom);
        Ok(atom)
    }

    /// Returns the name for `atom`, asking the server on a cache miss
    pub fn name(&mut self, transport: &mut dyn Transport, atom: Atom) -> Result<String> {
        if atom == NONE {
            return Err(Error::UnknownAtom(atom));
        }
        if let Some(name) = self.lookup_name(atom) {
            return Ok(name.to_owned());
        }

        let name = transport.atom_name(atom)?;
        self.insert(&name, atom);
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use std::str::FromStr;

    #[test]
    fn known_atoms_round_trip_names() {
        assert_eq!(KnownAtom::NetWmState.name(), "_NET_WM_STATE");
        assert_eq!(
            KnownAtom::from_str("_CTK_EDGE_CONSTRAINTS").ok(),
            Some(KnownAtom::EdgeConstraints)
        );
    }

    #[test]
    fn precache_uses_one_batch() {
        let mut transport = FakeTransport::new();
        let mut cache = AtomCache::new();
        cache.precache(&mut transport).unwrap();

        assert_eq!(transport.intern_batches(), 1);
        assert_ne!(cache.get(KnownAtom::WmProtocols), NONE);
        let state = cache.get(KnownAtom::NetWmState);
        assert_eq!(cache.lookup_name(state), Some("_NET_WM_STATE"));
    }

    #[test]
    fn intern_hits_cache() {
        let mut transport = FakeTransport::new();
        let mut cache = AtomCache::new();
        let a = cache.intern(&mut transport, "FOO").unwrap();
        let b = cache.intern(&mut transport, "FOO").unwrap();
        assert_eq!(a, b);
        assert_eq!(transport.intern_batches(), 1);
        assert_eq!(cache.name(&mut transport, a).unwrap(), "FOO");
    }

    #[test]
    fn predefined_atoms_need_no_request() {
        let mut transport = FakeTransport::new();
        let mut cache = AtomCache::new();
        let cardinal: Atom = AtomEnum::CARDINAL.into();
        assert_eq!(cache.intern(&mut transport, "CARDINAL").unwrap(), cardinal);
        assert_eq!(transport.intern_batches(), 0);
        assert!(cache.name(&mut transport, NONE).is_err());
    }
}
