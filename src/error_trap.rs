//! Nested error traps.
//!
//! A trap covers the half-open range of request serials `[start, end)`. While
//! a trap is open its end is unknown and it covers every later request. Errors
//! for covered requests are recorded on the innermost matching trap instead of
//! being treated as fatal.

use crate::{
    core::{serial_is_before, Serial, SUCCESS},
    error::XError,
};

/// A single trap on the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorTrap {
    /// First serial covered by the trap
    pub start_sequence: Serial,
    /// First serial no longer covered, `None` while the trap is open
    pub end_sequence:   Option<Serial>,
    /// Code of the last error recorded, `SUCCESS` if none
    pub error_code:     u8,
}

impl ErrorTrap {
    /// Returns `true` while the trap has not been popped
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.end_sequence.is_none()
    }

    /// Returns `true` if `serial` falls into the trap's range
    #[must_use]
    pub const fn covers(&self, serial: Serial) -> bool {
        if serial_is_before(serial, self.start_sequence) {
            return false;
        }
        match self.end_sequence {
            None => true,
            Some(end) => serial_is_before(serial, end),
        }
    }
}

/// What happened to an error handed to [`ErrorTrapStack::deliver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// A trap covered the request and recorded the code
    Trapped,
    /// No trap covered the request
    Unhandled,
}

/// The stack of traps, innermost last
#[derive(Debug, Default, Clone)]
pub struct ErrorTrapStack {
    traps: Vec<ErrorTrap>,
}

impl ErrorTrapStack {
    /// Create an empty stack
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of traps still held, open or closed
    #[must_use]
    pub fn len(&self) -> usize {
        self.traps.len()
    }

    /// Returns `true` if no trap is held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.traps.is_empty()
    }

    /// Number of traps that have not been popped
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.traps.iter().filter(|t| t.is_active()).count()
    }

    /// Iterate from outermost to innermost
    pub fn iter(&self) -> impl Iterator<Item = &ErrorTrap> {
        self.traps.iter()
    }

    /// Drop closed traps whose every request has been processed
    pub fn reap(&mut self, last_processed: Serial) -> usize {
        let before = self.traps.len();
        self.traps.retain(|t| match t.end_sequence {
            None => true,
            Some(end) => serial_is_before(last_processed, end),
        });
        let reaped = before - self.traps.len();
        if reaped > 0 {
            log::trace!("reaped {} closed error trap(s)", reaped);
        }
        reaped
    }

    /// Open a new trap covering requests from `next_request` on
    pub fn push(&mut self, next_request: Serial, last_processed: Serial) {
        self.reap(last_processed);
        self.traps.push(ErrorTrap {
            start_sequence: next_request,
            end_sequence:   None,
            error_code:     SUCCESS,
        });
    }

    /// Close the innermost open trap so that it covers `[start, next_request)`.
    ///
    /// Returns the code recorded so far, or `None` if no trap is open.
    pub fn close(&mut self, next_request: Serial) -> Option<u8> {
        let trap = self.traps.iter_mut().rev().find(|t| t.is_active())?;
        trap.end_sequence = Some(next_request);
        Some(trap.error_code)
    }

    /// Code recorded on the most recently closed trap that contains `serial`
    #[must_use]
    pub fn code_for(&self, serial: Serial) -> Option<u8> {
        self.traps
            .iter()
            .rev()
            .find(|t| t.covers(serial))
            .map(|t| t.error_code)
    }

    /// Route an error to the innermost covering trap
    pub fn deliver(&mut self, error: &XError) -> ErrorDisposition {
        match self.traps.iter_mut().rev().find(|t| t.covers(error.serial)) {
            Some(trap) => {
                log::debug!(
                    "trapped X error {} for serial {} (request {}.{})",
                    error.error_code,
                    error.serial,
                    error.request_code,
                    error.minor_code
                );
                trap.error_code = error.error_code;
                ErrorDisposition::Trapped
            },
            None => ErrorDisposition::Unhandled,
        }
    }
}

/// Describe an untrapped error the way the fatal handler prints it
#[must_use]
pub fn error_diagnostic(program: &str, description: &str, error: &XError) -> String {
    let extension = if error.request_code < 128 {
        String::from("core protocol")
    } else {
        error
            .extension
            .clone()
            .unwrap_or_else(|| String::from("unknown extension"))
    };

    format!(
        "The program '{}' received an X Window System error.\nThis probably reflects a bug in \
         the program.\nThe error was '{}'.\n  (Details: serial {} error_code {} request_code {} \
         ({}) minor_code {})\n  (Note to programmers: normally, X errors are reported \
         asynchronously;\n   that is, you will receive the error a while after causing it.\n   \
         To debug your program, run it with the XDPY_SYNCHRONIZE environment\n   variable to \
         change this behavior. You can then get a meaningful\n   backtrace from your debugger.)",
        program,
        description,
        error.serial,
        error.error_code,
        error.request_code,
        extension,
        error.minor_code,
    )
}

/// Short names for the core protocol error codes
#[must_use]
pub fn error_description(code: u8) -> &'static str {
    match code {
        1 => "BadRequest",
        2 => "BadValue",
        3 => "BadWindow",
        4 => "BadPixmap",
        5 => "BadAtom",
        6 => "BadCursor",
        7 => "BadFont",
        8 => "BadMatch",
        9 => "BadDrawable",
        10 => "BadAccess",
        11 => "BadAlloc",
        12 => "BadColor",
        13 => "BadGC",
        14 => "BadIDChoice",
        15 => "BadName",
        16 => "BadLength",
        17 => "BadImplementation",
        _ => "unknown error",
    }
}
