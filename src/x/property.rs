//! Properties on the server

use crate::{
    core::{Atom, NONE},
    x::atoms::{AtomCache, KnownAtom},
};
use std::convert::TryInto;

/// Raw reply of a `GetProperty` request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyReply {
    /// Actual type of the property, `NONE` if it does not exist
    pub type_:  Atom,
    /// 8, 16 or 32
    pub format: u8,
    /// Raw bytes in native byte order
    pub data:   Vec<u8>,
}

impl PropertyReply {
    /// Create a format-32 reply from a list of values
    #[must_use]
    pub fn from_u32(type_: Atom, values: &[u32]) -> Self {
        Self {
            type_,
            format: 32,
            data: values.iter().flat_map(|v| v.to_ne_bytes()).collect(),
        }
    }

    /// Create a format-8 reply holding a string
    #[must_use]
    pub fn from_string(type_: Atom, value: &str) -> Self {
        Self {
            type_,
            format: 8,
            data: value.as_bytes().to_vec(),
        }
    }

    /// Iterate over the values of a format-32 property
    pub fn value32(&self) -> Option<impl Iterator<Item = u32> + '_> {
        (self.format == 32).then(|| {
            self.data
                .chunks_exact(4)
                .filter_map(|c| c.try_into().ok().map(u32::from_ne_bytes))
        })
    }

    /// First value of a format-32 property
    #[must_use]
    pub fn first_u32(&self) -> Option<u32> {
        self.value32()?.next()
    }
}

// ============================ PropertyValue =========================

/// Decoded value of a property the display reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    /// `_NET_WM_STATE`: list of state atoms
    WmState(Vec<Atom>),
    /// `_NET_WM_DESKTOP`: workspace index, `0xFFFFFFFF` for all desktops
    WmDesktop(u32),
    /// `_CTK_EDGE_CONSTRAINTS`: packed per-edge tiled/resizable bits
    EdgeConstraints(u32),
    /// `_NET_SUPPORTED`: hints supported by the window manager
    Supported(Vec<Atom>),
    /// `_NET_SUPPORTING_WM_CHECK`: the check window
    SupportingWmCheck(Atom),
    /// `_NET_WM_NAME`: UTF-8 name
    WmName(String),
    /// Anything else, kept as raw bytes
    Other(PropertyReply),
}

impl PropertyValue {
    /// Decode `reply` according to the property it was read from.
    ///
    /// Returns `None` when the reply does not have the expected type or
    /// format for a known property.
    #[must_use]
    pub fn decode(atoms: &AtomCache, property: Atom, reply: PropertyReply) -> Option<Self> {
        const DECODED: [KnownAtom; 6] = [
            KnownAtom::NetWmState,
            KnownAtom::NetWmDesktop,
            KnownAtom::EdgeConstraints,
            KnownAtom::NetSupported,
            KnownAtom::NetSupportingWmCheck,
            KnownAtom::NetWmName,
        ];

        let atom_type = atoms.lookup("ATOM").unwrap_or(NONE);
        let cardinal = atoms.lookup("CARDINAL").unwrap_or(NONE);
        let window = atoms.lookup("WINDOW").unwrap_or(NONE);
        let known = (property != NONE)
            .then(|| DECODED.iter().copied().find(|k| atoms.get(*k) == property))
            .flatten();

        match known {
            Some(KnownAtom::NetWmState) if reply.type_ == atom_type => {
                Some(Self::WmState(reply.value32()?.collect()))
            },
            Some(KnownAtom::NetWmDesktop) if reply.type_ == cardinal => {
                reply.first_u32().map(Self::WmDesktop)
            },
            Some(KnownAtom::EdgeConstraints) if reply.type_ == cardinal => {
                reply.first_u32().map(Self::EdgeConstraints)
            },
            Some(KnownAtom::NetSupported) if reply.type_ == atom_type => {
                Some(Self::Supported(reply.value32()?.collect()))
            },
            Some(KnownAtom::NetSupportingWmCheck) if reply.type_ == window => {
                reply.first_u32().map(Self::SupportingWmCheck)
            },
            Some(KnownAtom::NetWmName) if reply.format == 8 => Some(Self::WmName(
                String::from_utf8_lossy(&reply.data).into_owned(),
            )),
            Some(_) => None,
            None => Some(Self::Other(reply)),
        }
    }
}
