//! Per-toplevel frame history.
//!
//! The window manager reports when a frame was drawn and when it reached the
//! screen. Those reports are matched to frames by the cookie the toplevel
//! sent with the frame, and are used to predict the next presentation time.

use crate::{display::Display, error::Result, window::WindowId, x::atoms::KnownAtom};
use std::collections::VecDeque;

/// Frames remembered per clock
pub const FRAME_HISTORY_LENGTH: usize = 16;
/// Refresh interval assumed until the window manager reports one (60Hz)
pub const DEFAULT_REFRESH_INTERVAL: i64 = 16_667;
/// Presentation times older than this are not used for prediction
const MAX_HISTORY_AGE: i64 = 150_000;

/// What is known about a single frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameTimings {
    /// Monotonically increasing frame number
    pub frame_counter:     i64,
    /// Value sent to the window manager at the end of the frame, `0` until then
    pub cookie:            u64,
    /// Local time the frame started
    pub frame_time:        i64,
    /// Local time the window manager finished drawing the frame
    pub drawn_time:        i64,
    /// Local time the frame reached the screen
    pub presentation_time: i64,
    /// Refresh interval reported with the frame
    pub refresh_interval:  i64,
    /// No more reports will arrive for this frame
    pub complete:          bool,
}

/// Ring of recent [`FrameTimings`] plus the freeze count that stops new
/// frames from starting while the window manager has not caught up
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    history:       VecDeque<FrameTimings>,
    frame_counter: i64,
    freeze_count:  u32,
}

impl FrameClock {
    /// Create a clock with no history
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame at `frame_time`
    pub fn begin_frame(&mut self, frame_time: i64) -> &mut FrameTimings {
        self.frame_counter += 1;
        if self.history.len() == FRAME_HISTORY_LENGTH {
            self.history.pop_front();
        }
        self.history.push_back(FrameTimings {
            frame_counter: self.frame_counter,
            frame_time,
            ..FrameTimings::default()
        });

        // Just pushed
        let idx = self.history.len() - 1;
        &mut self.history[idx]
    }

    /// Number of the most recent frame
    #[must_use]
    pub const fn frame_counter(&self) -> i64 {
        self.frame_counter
    }

    /// Oldest frame still in the history
    #[must_use]
    pub fn history_start(&self) -> i64 {
        self.history
            .front()
            .map_or(self.frame_counter, |t| t.frame_counter)
    }

    /// Timings of frame `frame_counter`, if still remembered
    #[must_use]
    pub fn timings(&self, frame_counter: i64) -> Option<&FrameTimings> {
        self.history.iter().find(|t| t.frame_counter == frame_counter)
    }

    /// Timings of the frame being drawn
    pub fn current_timings_mut(&mut self) -> Option<&mut FrameTimings> {
        self.history.back_mut()
    }

    /// Timings of the frame that was sent with `cookie`
    pub fn find_by_cookie_mut(&mut self, cookie: u64) -> Option<&mut FrameTimings> {
        if cookie == 0 {
            return None;
        }
        self.history.iter_mut().rev().find(|t| t.cookie == cookie)
    }

    /// Stop starting new frames
    pub fn freeze(&mut self) {
        self.freeze_count += 1;
    }

    /// Undo one [`freeze`](Self::freeze)
    pub fn thaw(&mut self) {
        if self.freeze_count == 0 {
            log::warn!("frame clock thawed more often than frozen");
            return;
        }
        self.freeze_count -= 1;
    }

    /// Returns `true` while at least one freeze is held
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.freeze_count > 0
    }

    /// Predict the refresh interval and the first presentation time at or
    /// after `base_time`. The presentation time is `0` when no recent frame
    /// has one.
    #[must_use]
    pub fn refresh_info(&self, base_time: i64) -> (i64, i64) {
        let mut default_interval = DEFAULT_REFRESH_INTERVAL;

        for timings in self.history.iter().rev() {
            let interval = if timings.refresh_interval == 0 {
                default_interval
            } else {
                default_interval = timings.refresh_interval;
                timings.refresh_interval
            };

            if timings.presentation_time != 0 {
                if timings.presentation_time > base_time - MAX_HISTORY_AGE {
                    let mut presentation = timings.presentation_time;
                    while presentation < base_time {
                        presentation += interval;
                    }
                    return (interval, presentation);
                }
                break;
            }
        }

        (default_interval, 0)
    }
}

// ========================== Frame sync ========================== [[[

impl Display {
    /// Start a frame of toplevel `id`. Returns `false` while updates are
    /// frozen; nothing should be drawn then.
    ///
    /// With an extended sync counter the counter is moved to an odd value,
    /// telling the window manager a frame is in progress.
    pub fn begin_frame(&mut self, id: WindowId) -> Result<bool> {
        let now = (self.clock)();
        let use_sync = self.use_sync;
        let toplevel = match self.windows.toplevel_mut(id) {
            Some(toplevel) => toplevel,
            None => return Ok(false),
        };
        if toplevel.frame_clock.is_frozen() {
            return Ok(false);
        }

        toplevel.frame_clock.begin_frame(now);

        if use_sync
            && toplevel.extended_update_counter != 0
            && toplevel.current_counter_value % 2 == 0
        {
            toplevel.current_counter_value += 1;
            let (counter, value) =
                (toplevel.extended_update_counter, toplevel.current_counter_value);
            self.transport.set_counter(counter, value)?;
        }

        Ok(true)
    }

    /// Finish the frame started by [`begin_frame`](Self::begin_frame)
    pub fn end_frame(&mut self, id: WindowId) -> Result<()> {
        if self.windows.toplevel(id).is_none() {
            return Ok(());
        }
        let frame_drawn = self.supports_hint(KnownAtom::NetWmFrameDrawn);

        let toplevel = match self.windows.toplevel_mut(id) {
            Some(toplevel) => toplevel,
            None => return Ok(()),
        };
        let mut updates = Vec::with_capacity(2);

        if toplevel.extended_update_counter != 0 && toplevel.current_counter_value % 2 == 1 {
            if toplevel.configure_counter_value != 0
                && toplevel.configure_counter_value_is_extended
            {
                // Even values mean "frame complete"
                let value = toplevel.configure_counter_value;
                toplevel.current_counter_value = value + value % 2;
                toplevel.configure_counter_value = 0;
            } else {
                toplevel.current_counter_value += 1;
            }
            updates.push((toplevel.extended_update_counter, toplevel.current_counter_value));

            if frame_drawn {
                toplevel.frame_pending = true;
                toplevel.frame_clock.freeze();
                let cookie = toplevel.current_counter_value as u64;
                if let Some(timings) = toplevel.frame_clock.current_timings_mut() {
                    timings.cookie = cookie;
                }
            }
        }

        if toplevel.configure_counter_value != 0 && !toplevel.configure_counter_value_is_extended
        {
            updates.push((toplevel.update_counter, toplevel.configure_counter_value));
            toplevel.configure_counter_value = 0;
        }

        for (counter, value) in updates {
            log::trace!("sync counter 0x{:x} = {}", counter, value);
            self.transport.set_counter(counter, value)?;
        }

        Ok(())
    }
}

// ]]] === Frame sync ===
