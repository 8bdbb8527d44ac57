//! Selections owned through this display.
//!
//! A `SelectionClear` only reaches the application when it concerns the
//! ownership this client last set: a clear sent before a newer
//! `SetSelectionOwner` for the same selection is stale and dropped.

use crate::{
    core::{serial_is_at_or_after, Atom, Serial, Timestamp, Window, NONE},
    display::Display,
    error::Result,
    window::WindowId,
    x::event::SelectionEvent,
};

/// A selection this client made a window own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionOwner {
    pub selection: Atom,
    pub owner:     Window,
    /// Serial of the `SetSelectionOwner` request
    pub serial:    Serial,
}

/// The selections currently owned, at most one entry per selection
#[derive(Debug, Default, Clone)]
pub struct SelectionOwners {
    owners: Vec<SelectionOwner>,
}

impl SelectionOwners {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded owner of `selection`
    #[must_use]
    pub fn get(&self, selection: Atom) -> Option<&SelectionOwner> {
        self.owners.iter().find(|o| o.selection == selection)
    }

    /// Replace the entry for `selection`. Disowning (`NONE`) only removes it.
    pub fn set(&mut self, selection: Atom, owner: Window, serial: Serial) {
        self.owners.retain(|o| o.selection != selection);
        if owner != NONE {
            self.owners.push(SelectionOwner {
                selection,
                owner,
                serial,
            });
        }
    }

    /// Drop every selection owned by a destroyed window
    pub fn forget_window(&mut self, owner: Window) {
        self.owners.retain(|o| o.owner != owner);
    }

    /// Returns `true` if the clear ends the recorded ownership, which is then
    /// forgotten. Clears for unknown selections, other windows or an older
    /// ownership are stale.
    pub fn filter_clear(&mut self, event: &SelectionEvent, serial: Serial) -> bool {
        let idx = match self.owners.iter().position(|o| o.selection == event.selection) {
            Some(idx) => idx,
            None => return false,
        };

        let info = self.owners[idx];
        if info.owner == event.window && serial_is_at_or_after(serial, info.serial) {
            self.owners.remove(idx);
            true
        } else {
            log::debug!(
                "stale selection clear for {} on 0x{:x} (serial {}, owned since {})",
                event.selection,
                event.window,
                serial,
                info.serial
            );
            false
        }
    }
}

impl Display {
    /// Make `owner` the owner of `selection`, or give the selection up with
    /// `None`. Returns whether the server reports the requested owner
    /// afterwards.
    pub fn set_selection_owner(
        &mut self,
        owner: Option<WindowId>,
        selection: Atom,
        time: Timestamp,
    ) -> Result<bool> {
        let xid = match owner {
            Some(id) => match self.windows.get(id) {
                Some(record) if !record.destroyed => record.xid,
                _ => return Ok(false),
            },
            None => NONE,
        };

        let serial = self.transport.next_request();
        self.selections.set(selection, xid, serial);
        self.transport.set_selection_owner(xid, selection, time)?;

        Ok(self.transport.selection_owner(selection)? == xid)
    }

    /// The selections currently owned through this display
    #[must_use]
    pub const fn selection_owners(&self) -> &SelectionOwners {
        &self.selections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::WindowKind,
        event::EventKind,
        geometry::Rectangle,
        testing::{self, FakeTransport, Request},
        x::event::{XEvent, XEventKind},
    };

    fn clear(window: Window, selection: Atom) -> SelectionEvent {
        SelectionEvent {
            window,
            requestor: NONE,
            selection,
            target: NONE,
            property: NONE,
            time: 0,
        }
    }

    fn owned(fake: &FakeTransport, display: &mut Display) -> (WindowId, Window) {
        let id = display
            .create_window(WindowKind::Child, None, Rectangle::new(0, 0, 10, 10))
            .expect("window created");
        let xid = display.window(id).map(|r| r.xid).unwrap_or_default();
        fake.server().clear_requests();
        (id, xid)
    }

    #[test]
    fn only_current_ownership_is_cleared() {
        let mut owners = SelectionOwners::new();
        owners.set(1, 0x10, 50);

        assert!(!owners.filter_clear(&clear(0x10, 2), 60));
        assert!(!owners.filter_clear(&clear(0x11, 1), 60));
        assert!(!owners.filter_clear(&clear(0x10, 1), 49));
        assert!(owners.filter_clear(&clear(0x10, 1), 50));
        assert!(owners.get(1).is_none());
        assert!(!owners.filter_clear(&clear(0x10, 1), 70));
    }

    #[test]
    fn disowning_and_destroyed_windows_forget() {
        let mut owners = SelectionOwners::new();
        owners.set(1, 0x10, 5);
        owners.set(2, 0x10, 6);
        owners.set(1, NONE, 7);
        assert!(owners.get(1).is_none());

        owners.forget_window(0x10);
        assert!(owners.get(2).is_none());
    }

    #[test]
    fn owner_is_recorded_with_request_serial() {
        let fake = FakeTransport::new();
        let mut display = testing::open_with(&fake);
        let (id, xid) = owned(&fake, &mut display);
        let selection = display.atoms.intern(&mut *display.transport, "CLIPBOARD").unwrap();
        let serial = display.next_serial();

        assert!(display.set_selection_owner(Some(id), selection, 1234).unwrap());
        assert_eq!(
            display.selection_owners().get(selection),
            Some(&SelectionOwner {
                selection,
                owner: xid,
                serial,
            })
        );
        assert!(fake.server().requests().iter().any(|(s, r)| *s == serial
            && *r
                == Request::SetSelectionOwner {
                    owner: xid,
                    selection,
                    time: 1234,
                }));
    }

    #[test]
    fn stale_clear_is_not_translated() {
        let fake = FakeTransport::new();
        let mut display = testing::open_with(&fake);
        let (id, xid) = owned(&fake, &mut display);
        let selection = 0x99;

        let old_serial = display.next_serial();
        display.set_selection_owner(Some(id), selection, 0).unwrap();
        display.set_selection_owner(Some(id), selection, 0).unwrap();

        // sent by the server before the second ownership was set
        let stale = XEvent::new(old_serial, XEventKind::SelectionClear(clear(xid, selection)));
        display.process_xevent(&stale);
        assert!(display.next_event().is_none());

        let current = XEvent::new(
            display.next_serial(),
            XEventKind::SelectionClear(clear(xid, selection)),
        );
        display.process_xevent(&current);
        let event = display.next_event().map(|e| (e.kind, e.window));
        assert_eq!(
            event,
            Some((EventKind::SelectionClear { selection, time: 0 }, Some(id)))
        );
        assert!(display.selection_owners().get(selection).is_none());
    }
}
