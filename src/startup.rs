//! Startup notification: the launch id handed over by the launcher, and the
//! messages broadcast on the root window when startup is complete

use crate::{
    core::{Timestamp, CURRENT_TIME},
    display::Display,
    error::Result,
    geometry::Rectangle,
    x::{
        atoms::KnownAtom,
        event::{ClientMessageData, ClientMessageEvent},
        transport::WindowAttributes,
    },
};
use x11rb::protocol::xproto::{EventMask, PropMode};

/// Payload bytes of a format-8 client message
const CHUNK_LEN: usize = 20;

/// Marker preceding the launch timestamp in a startup id
const TIME_MARKER: &str = "_TIME";

/// Build `kind: KEY="value" ...`, skipping keys without a value
pub(crate) fn startup_message(kind: &str, pairs: &[(&str, Option<&str>)]) -> String {
    let mut message = format!("{}:", kind);
    for (key, value) in pairs {
        let value = match value {
            Some(v) => v,
            None => continue,
        };
        message.push(' ');
        message.push_str(key);
        message.push_str("=\"");
        for c in value.chars() {
            if matches!(c, ' ' | '"' | '\\') {
                message.push('\\');
            }
            message.push(c);
        }
        message.push('"');
    }
    message
}

/// Split `message` plus its terminating NUL into zero padded chunks
fn message_chunks(message: &str) -> Vec<[u8; CHUNK_LEN]> {
    let mut bytes = message.as_bytes().to_vec();
    bytes.push(0);
    bytes
        .chunks(CHUNK_LEN)
        .map(|chunk| {
            let mut data = [0; CHUNK_LEN];
            data[..chunk.len()].copy_from_slice(chunk);
            data
        })
        .collect()
}

/// Parse an unsigned number the way C's `strtoul` does with base 0: `0x`
/// means hex, a leading `0` octal, anything else decimal. Trailing garbage is
/// ignored. `None` if there are no digits or the value does not fit.
fn parse_launch_time(text: &str) -> Option<Timestamp> {
    let text = text.trim_start();
    let text = text.strip_prefix('+').unwrap_or(text);

    let (radix, digits) = match text.as_bytes() {
        [b'0', b'x' | b'X', next, ..] if next.is_ascii_hexdigit() => (16, &text[2..]),
        [b'0', ..] => (8, text),
        _ => (10, text),
    };

    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    Timestamp::from_str_radix(&digits[..end], radix).ok()
}

impl Display {
    /// The startup id set on this display, if any
    #[must_use]
    pub fn startup_notification_id(&self) -> Option<&str> {
        self.startup_id.as_deref()
    }

    /// Remember the id the launcher handed over and publish it on the leader
    /// window. A `_TIME<n>` suffix sets the user time to the launch time.
    pub fn set_startup_notification_id(&mut self, id: Option<&str>) -> Result<()> {
        self.startup_id = id.map(ToOwned::to_owned);
        let atom = self.atoms.get(KnownAtom::NetStartupId);

        let id = match id {
            Some(id) => id,
            None => {
                self.user_time = CURRENT_TIME;
                return self.transport.delete_property(self.leader, atom);
            },
        };

        match id.rfind(TIME_MARKER) {
            Some(idx) => match parse_launch_time(&id[idx + TIME_MARKER.len()..]) {
                Some(time) => self.user_time = time,
                None => log::debug!("startup id {:?} has an unreadable launch time", id),
            },
            None => self.user_time = CURRENT_TIME,
        }

        let utf8 = self.atoms.get(KnownAtom::Utf8String);
        self.transport.change_property(
            self.leader,
            atom,
            utf8,
            8,
            PropMode::REPLACE,
            id.as_bytes(),
        )
    }

    /// Broadcast a startup-notification message to every client watching the
    /// root window. Untrusted clients cannot broadcast and do nothing.
    pub fn broadcast_startup_message(
        &mut self,
        kind: &str,
        pairs: &[(&str, Option<&str>)],
    ) -> Result<()> {
        if !self.trusted || self.closed {
            log::debug!("not broadcasting startup message {:?}", kind);
            return Ok(());
        }

        let message = startup_message(kind, pairs);
        log::debug!("broadcasting startup message: {}", message);

        let root = self.screen.root;
        let window = self.transport.create_window(
            root,
            Rectangle::new(-100, -100, 1, 1),
            WindowAttributes {
                override_redirect: true,
                event_mask:        EventMask::PROPERTY_CHANGE | EventMask::STRUCTURE_NOTIFY,
                input_only:        false,
            },
        )?;

        let begin = self.atoms.get(KnownAtom::NetStartupInfoBegin);
        let more = self.atoms.get(KnownAtom::NetStartupInfo);
        for (idx, chunk) in message_chunks(&message).into_iter().enumerate() {
            let message = ClientMessageEvent {
                window,
                type_: if idx == 0 { begin } else { more },
                data: ClientMessageData::U8(chunk),
            };
            self.transport
                .send_client_message(root, false, EventMask::PROPERTY_CHANGE, message)?;
        }

        self.transport.destroy_window(window)?;
        self.flush()
    }

    /// Tell the launcher the application finished starting. Without an id the
    /// stored startup id is used up; with neither this does nothing.
    pub fn notify_startup_complete(&mut self, id: Option<&str>) -> Result<()> {
        let id = match id {
            Some(id) => id.to_owned(),
            None => match self.startup_id.take() {
                Some(id) => id,
                None => return Ok(()),
            },
        };
        self.broadcast_startup_message("remove", &[("ID", Some(&id))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::DisplaySettings,
        testing::{self, Request},
        x::transport::Transport,
    };

    fn sent_messages(fake: &testing::FakeTransport) -> Vec<ClientMessageEvent> {
        fake.server()
            .requests()
            .iter()
            .filter_map(|(_, r)| match r {
                Request::SendEvent { message, .. } => Some(*message),
                _ => None,
            })
            .collect()
    }

    /// The text carried by the broadcast chunks, up to the terminating NUL
    fn reassembled(messages: &[ClientMessageEvent]) -> String {
        let mut bytes = messages
            .iter()
            .flat_map(|m| match m.data {
                ClientMessageData::U8(d) => d.to_vec(),
                _ => Vec::new(),
            })
            .collect::<Vec<_>>();
        let end = bytes.iter().position(|b| *b == 0).unwrap();
        bytes.truncate(end);
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn message_escapes_values() {
        assert_eq!(
            startup_message("remove", &[
                ("ID", Some(r#"a b"c\d"#)),
                ("SCREEN", None),
                ("NAME", Some("x")),
            ]),
            r#"remove: ID="a\ b\"c\\d" NAME="x""#
        );
        assert_eq!(startup_message("new", &[]), "new:");
    }

    #[test]
    fn chunks_are_padded_and_terminated() {
        let chunks = message_chunks("0123456789abcdefghij");
        assert_eq!(chunks.len(), 2);
        assert_eq!(&chunks[0], b"0123456789abcdefghij");
        assert_eq!(chunks[1], [0; CHUNK_LEN]);

        let chunks = message_chunks("abc");
        assert_eq!(chunks.len(), 1);
        assert_eq!(&chunks[0][..4], b"abc\0");
    }

    #[test]
    fn launch_time_parses_like_strtoul() {
        assert_eq!(parse_launch_time("1234"), Some(1234));
        assert_eq!(parse_launch_time("0x1f"), Some(31));
        assert_eq!(parse_launch_time("017"), Some(15));
        assert_eq!(parse_launch_time("0"), Some(0));
        assert_eq!(parse_launch_time("42abc"), Some(42));
        assert_eq!(parse_launch_time("0xg"), Some(0));
        assert_eq!(parse_launch_time(""), None);
        assert_eq!(parse_launch_time("abc"), None);
        assert_eq!(parse_launch_time("99999999999"), None);
    }

    #[test]
    fn startup_id_sets_user_time() {
        let fake = testing::FakeTransport::new();
        let mut display = testing::open_with(&fake);

        display
            .set_startup_notification_id(Some("launch_TIME12_TIME5678"))
            .unwrap();
        assert_eq!(display.user_time(), 5678);
        assert_eq!(display.startup_notification_id(), Some("launch_TIME12_TIME5678"));

        let leader = display.leader();
        let atom = display.atoms().get(KnownAtom::NetStartupId);
        let stored = fake.server().property(leader, atom).cloned().unwrap();
        assert_eq!(stored.format, 8);
        assert_eq!(stored.data, b"launch_TIME12_TIME5678");

        // unreadable time leaves the user time alone
        display.set_startup_notification_id(Some("other_TIME")).unwrap();
        assert_eq!(display.user_time(), 5678);

        display.set_startup_notification_id(Some("plain")).unwrap();
        assert_eq!(display.user_time(), 0);

        display.set_startup_notification_id(Some("x_TIME9")).unwrap();
        display.set_startup_notification_id(None).unwrap();
        assert_eq!(display.user_time(), 0);
        assert!(fake.server().property(leader, atom).is_none());
    }

    #[test]
    fn startup_id_from_settings() {
        let fake = testing::FakeTransport::new();
        let display = testing::open_with_settings(&fake, DisplaySettings {
            startup_id: Some("app_TIME77".to_owned()),
            ..DisplaySettings::default()
        });
        assert_eq!(display.user_time(), 77);
    }

    #[test]
    fn broadcast_sends_chunks_from_a_temporary_window() {
        let fake = testing::FakeTransport::new();
        let mut display = testing::open_with(&fake);
        fake.server().clear_requests();

        display
            .broadcast_startup_message("remove", &[("ID", Some("a long startup id"))])
            .unwrap();

        let requests = fake.server().requests().to_vec();
        let temp = match &requests[0].1 {
            Request::CreateWindow {
                window,
                parent,
                geometry,
                attributes,
            } => {
                assert_eq!(*parent, testing::ROOT);
                assert_eq!(*geometry, Rectangle::new(-100, -100, 1, 1));
                assert!(attributes.override_redirect);
                *window
            },
            other => panic!("expected a window first, got {:?}", other),
        };
        assert_eq!(
            requests.last().map(|(_, r)| r.clone()),
            Some(Request::DestroyWindow(temp))
        );

        let begin = display.atoms().get(KnownAtom::NetStartupInfoBegin);
        let more = display.atoms().get(KnownAtom::NetStartupInfo);
        let messages = sent_messages(&fake);
        // `remove: ID="a\ long\ startup\ id"` plus NUL is 34 bytes
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].type_, begin);
        assert_eq!(messages[1].type_, more);
        assert!(messages.iter().all(|m| m.window == temp));

        assert_eq!(
            reassembled(&messages),
            r#"remove: ID="a\ long\ startup\ id""#
        );

        for (_, request) in &requests {
            if let Request::SendEvent {
                destination,
                propagate,
                mask,
                ..
            } = request
            {
                assert_eq!(*destination, testing::ROOT);
                assert!(!propagate);
                assert_eq!(*mask, EventMask::PROPERTY_CHANGE);
            }
        }
    }

    #[test]
    fn complete_uses_up_the_stored_id() {
        let fake = testing::FakeTransport::new();
        let mut display = testing::open_with(&fake);
        display.set_startup_notification_id(Some("s1")).unwrap();
        fake.server().clear_requests();

        display.notify_startup_complete(None).unwrap();
        assert_eq!(display.startup_notification_id(), None);
        let messages = sent_messages(&fake);
        assert_eq!(messages.len(), 1);
        assert_eq!(reassembled(&messages), r#"remove: ID="s1""#);

        fake.server().clear_requests();
        display.notify_startup_complete(None).unwrap();
        assert!(fake.server().requests().is_empty());

        // 21 bytes plus NUL spill into a second chunk
        display.notify_startup_complete(Some("explicit")).unwrap();
        let messages = sent_messages(&fake);
        assert_eq!(messages.len(), 2);
        assert_eq!(reassembled(&messages), r#"remove: ID="explicit""#);
    }

    #[test]
    fn untrusted_displays_do_not_broadcast() {
        let fake = testing::FakeTransport::new();
        let mut display = testing::open_with(&fake);
        display.trusted = false;
        let before = fake.server().next_request();

        display.notify_startup_complete(Some("id")).unwrap();
        assert_eq!(fake.server().next_request(), before);
    }
}
