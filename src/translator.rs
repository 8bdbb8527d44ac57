//! Event translators: turn wire events into toolkit events.
//!
//! Translators are asked in the order they were registered; the first one
//! that returns an event claims it.

use crate::{
    core::Window,
    display::Display,
    error::Result,
    event::{Event, EventMask},
    window::WindowId,
    x::event::XEvent,
};
use std::{fmt, mem};

/// Something that can translate [`XEvent`]s
pub trait EventTranslator {
    /// Name used in log messages
    fn name(&self) -> &'static str;

    /// Translate `xevent`, or return `None` to let the next translator try
    fn translate_event(&mut self, display: &mut Display, xevent: &XEvent) -> Option<Event>;

    /// Toolkit events this translator produces
    fn handled_events(&self) -> EventMask;

    /// Select the wire events needed to produce `mask` on `window`
    fn select_window_events(
        &mut self,
        _display: &mut Display,
        _window: Window,
        _mask: EventMask,
    ) -> Result<()> {
        Ok(())
    }

    /// The window `xevent` is about, if the translator knows better than the
    /// event's own window field
    fn window(&self, _display: &Display, _xevent: &XEvent) -> Option<WindowId> {
        None
    }
}

/// The ordered list of translators of a display
#[derive(Default)]
pub struct TranslatorRegistry {
    translators: Vec<Box<dyn EventTranslator>>,
}

impl fmt::Debug for TranslatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl TranslatorRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a translator; it is asked after every earlier one
    pub fn register(&mut self, translator: Box<dyn EventTranslator>) {
        log::debug!("registering event translator {}", translator.name());
        self.translators.push(translator);
    }

    /// Names in priority order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.translators.iter().map(|t| t.name())
    }

    /// Number of translators
    #[must_use]
    pub fn len(&self) -> usize {
        self.translators.len()
    }

    /// Returns `true` if no translator is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.translators.is_empty()
    }

    /// Union of the events every translator produces
    #[must_use]
    pub fn handled_events(&self) -> EventMask {
        self.translators
            .iter()
            .fold(EventMask::empty(), |mask, t| mask | t.handled_events())
    }

    /// Take the translators out so they can borrow the display mutably
    pub(crate) fn detach(&mut self) -> Vec<Box<dyn EventTranslator>> {
        mem::take(&mut self.translators)
    }

    /// Put detached translators back in front of any registered meanwhile
    pub(crate) fn reattach(&mut self, translators: Vec<Box<dyn EventTranslator>>) {
        let added = mem::replace(&mut self.translators, translators);
        self.translators.extend(added);
    }
}

impl Display {
    /// Add a translator behind the ones already registered
    pub fn register_translator(&mut self, translator: Box<dyn EventTranslator>) {
        self.translators.register(translator);
    }

    /// The registered translators
    #[must_use]
    pub const fn translators(&self) -> &TranslatorRegistry {
        &self.translators
    }

    /// Toolkit events the registered translators can produce
    #[must_use]
    pub fn handled_events(&self) -> EventMask {
        self.translators.handled_events()
    }

    /// Run the translators in order; the first event produced wins
    pub(crate) fn run_translators(&mut self, xevent: &XEvent) -> Option<Event> {
        let mut translators = self.translators.detach();
        let event = translators.iter_mut().find_map(|t| {
            let event = t.translate_event(self, xevent);
            if event.is_some() {
                log::trace!("{} translated serial {}", t.name(), xevent.serial);
            }
            event
        });
        self.translators.reattach(translators);
        event
    }

    /// The window a wire event should be dispatched to
    pub(crate) fn event_target(&self, xevent: &XEvent) -> Option<WindowId> {
        self.translators
            .translators
            .iter()
            .find_map(|t| t.window(self, xevent))
            .or_else(|| xevent.event_window().and_then(|w| self.windows.find(w)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event::EventKind,
        testing,
        x::event::XEventKind,
    };

    /// Claims every `MappingNotify`
    struct Claimer(&'static str);

    impl EventTranslator for Claimer {
        fn name(&self) -> &'static str {
            self.0
        }

        fn translate_event(&mut self, display: &mut Display, xevent: &XEvent) -> Option<Event> {
            matches!(xevent.kind, XEventKind::MappingNotify)
                .then(|| Event::new(EventKind::Map, Some(display.screen().root_id())))
        }

        fn handled_events(&self) -> EventMask {
            EventMask::KEY_PRESS
        }
    }

    #[test]
    fn registry_keeps_order() {
        let mut registry = TranslatorRegistry::new();
        registry.register(Box::new(Claimer("first")));
        registry.register(Box::new(Claimer("second")));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["first", "second"]);
        assert_eq!(registry.handled_events(), EventMask::KEY_PRESS);
    }

    #[test]
    fn reattach_keeps_late_registrations() {
        let mut registry = TranslatorRegistry::new();
        registry.register(Box::new(Claimer("first")));
        let detached = registry.detach();
        assert!(registry.is_empty());
        registry.register(Box::new(Claimer("late")));
        registry.reattach(detached);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["first", "late"]);
    }

    #[test]
    fn first_translator_wins() {
        let fake = testing::FakeTransport::new();
        let mut display = testing::open_with(&fake);
        display.register_translator(Box::new(Claimer("extra")));

        // the core translator drops MappingNotify, the extra one claims it
        let event = display.run_translators(&XEvent::new(7, XEventKind::MappingNotify));
        assert_eq!(event.map(|e| e.kind), Some(EventKind::Map));
        assert_eq!(display.translators.len(), 2);
        assert!(display.handled_events().contains(EventMask::KEY_PRESS | EventMask::STRUCTURE));
    }
}
