use storybook_core::{Frame, RunState};

/// Receives run updates while a session is being driven.
///
/// Both hooks see the state after the update was applied.
pub trait RunObserver {
    /// Called after each decoded frame.
    fn on_frame(&mut self, _frame: &Frame, _state: &RunState) {}

    /// Called when the run is submitted and when it settles.
    fn on_status(&mut self, _state: &RunState) {}
}

impl RunObserver for () {}
