//! Errors found throughout this crate

use crate::{
    core::{Atom, Serial, Xid},
    window::WindowId,
};
use thiserror::Error;
use x11rb::errors::{ConnectError, ConnectionError};

/// A protocol error reported by the server for a single request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XError {
    /// Sequence number of the failing request
    pub serial:        Serial,
    /// Protocol error code
    pub error_code:    u8,
    /// Major opcode of the failing request
    pub request_code:  u8,
    /// Minor opcode of the failing request
    pub minor_code:    u16,
    /// Offending value (resource id, atom, ...)
    pub resource_id:   u32,
    /// Extension owning the major opcode, if any
    pub extension:     Option<String>,
}

/// Errors that occur from interacting with the X-Server
#[derive(Debug, Error)]
pub enum Error {
    /// Failure to connect to the server
    #[error("failed to connect to the X11 server: {0}")]
    Connect(#[from] ConnectError),

    /// The connection broke or a request could not be sent
    #[error("X11 connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// The server answered a request with an error
    #[error("X11 request failed with error code {} (request {}.{}, serial {})", .0.error_code, .0.request_code, .0.minor_code, .0.serial)]
    Request(XError),

    /// An atom could not be interned or named
    #[error("the atom {0} was not found on this server")]
    UnknownAtom(Atom),

    /// A window id that the display does not know about
    #[error("no window is registered for 0x{0:x}")]
    UnknownWindow(Xid),

    /// A window handle that no longer refers to a record
    #[error("window {0} is not registered")]
    NoRecord(WindowId),

    /// The connection does not have the requested screen
    #[error("the display has no screen {0}")]
    NoScreen(usize),

    /// The display has been closed
    #[error("the display connection is closed")]
    Closed,

    /// Polling the connection failed
    #[error("failed to poll the connection: {0}")]
    Poll(#[from] nix::Error),
}

/// Shorthand result type used by the display internals
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<x11rb::errors::ReplyError> for Error {
    fn from(e: x11rb::errors::ReplyError) -> Self {
        match e {
            x11rb::errors::ReplyError::ConnectionError(e) => Self::Connection(e),
            x11rb::errors::ReplyError::X11Error(e) => Self::Request(XError {
                serial:       u32::from(e.sequence),
                error_code:   e.error_code,
                request_code: e.major_opcode,
                minor_code:   e.minor_opcode,
                resource_id:  e.bad_value,
                extension:    e.extension_name,
            }),
        }
    }
}

impl From<x11rb::errors::ReplyOrIdError> for Error {
    fn from(e: x11rb::errors::ReplyOrIdError) -> Self {
        match e {
            x11rb::errors::ReplyOrIdError::ConnectionError(e) => Self::Connection(e),
            x11rb::errors::ReplyOrIdError::X11Error(e) => {
                Self::from(x11rb::errors::ReplyError::X11Error(e))
            },
            x11rb::errors::ReplyOrIdError::IdsExhausted => {
                Self::Connection(ConnectionError::InsufficientMemory)
            },
        }
    }
}
