//! Frame/page advance state machine.
//!
//! After each draw the caller asks [`FrameScheduler::next`] how long the frame
//! on screen should stay there. Animations and paged documents go through the
//! same question; they differ only in whether `Infinite` is ever returned.

use crate::decoder::handle::ImageHandle;
use crate::decoder::{Advance, HoldTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// Nothing drawn since the source was bound
    #[default]
    NotStarted,
    /// A frame is current and more may follow
    FrameReady,
    /// Every frame or page has been shown
    LastFrameShown,
    /// Decoding failed; terminal
    Errored,
}

impl SchedulerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SchedulerState::LastFrameShown | SchedulerState::Errored)
    }
}

#[derive(Debug, Default)]
pub struct FrameScheduler {
    state: SchedulerState,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Decide how long to hold the current frame and step the decoder past it.
    pub fn next(&mut self, handle: &mut ImageHandle) -> HoldTime {
        match self.state {
            SchedulerState::NotStarted => {
                // First frame has not been drawn yet
                self.state = SchedulerState::FrameReady;
                HoldTime::Immediate
            }
            SchedulerState::FrameReady => match handle.advance() {
                Ok(Advance::Frame(hold)) => hold,
                Ok(Advance::Exhausted) => {
                    log::debug!("Last frame of {} shown", handle.origin());
                    self.state = SchedulerState::LastFrameShown;
                    HoldTime::Infinite
                }
                Err(e) => {
                    log::error!("Failed to advance {}: {}", handle.origin(), e);
                    self.fail();
                    HoldTime::Infinite
                }
            },
            SchedulerState::LastFrameShown | SchedulerState::Errored => HoldTime::Infinite,
        }
    }

    /// Enter the terminal error state, e.g. after a failed draw.
    pub fn fail(&mut self) {
        self.state = SchedulerState::Errored;
    }
}
