//! Keyboard mapping and modifier state as reported by the server

/// Lock modifier bit (Caps Lock)
const LOCK_MASK: u16 = 1 << 1;

/// What the display knows about the keyboard.
///
/// The mapping itself is not cached; `generation` bumps whenever it changes so
/// consumers know to refetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Keymap {
    generation: u64,
    mods:       u16,
    group:      u8,
}

impl Keymap {
    /// Create a keymap with no modifiers active
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The key mapping changed
    pub fn keys_changed(&mut self) {
        self.generation += 1;
        log::debug!("keyboard mapping changed (generation {})", self.generation);
    }

    /// Record new modifier state. Returns `true` if anything changed.
    pub fn state_changed(&mut self, mods: u16, group: u8) -> bool {
        if self.mods == mods && self.group == group {
            return false;
        }
        log::trace!("keyboard state: mods=0x{:x} group={}", mods, group);
        self.mods = mods;
        self.group = group;
        true
    }

    /// Number of mapping changes seen
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Effective modifier mask
    #[must_use]
    pub const fn mods(&self) -> u16 {
        self.mods
    }

    /// Effective layout group
    #[must_use]
    pub const fn group(&self) -> u8 {
        self.group
    }

    #[must_use]
    pub const fn caps_lock(&self) -> bool {
        self.mods & LOCK_MASK != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_changes_are_reported_once() {
        let mut keymap = Keymap::new();
        assert!(keymap.state_changed(LOCK_MASK, 1));
        assert!(!keymap.state_changed(LOCK_MASK, 1));
        assert!(keymap.caps_lock());
        assert_eq!(keymap.group(), 1);

        keymap.keys_changed();
        keymap.keys_changed();
        assert_eq!(keymap.generation(), 2);
    }
}
