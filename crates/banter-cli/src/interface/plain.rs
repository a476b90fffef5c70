//! Minimal presenter for non-interactive runs.

use super::{Presenter, TurnEvent};

/// Presenter for scripted use: the caller prints the final text itself,
/// so only errors surface here, on stderr.
pub struct PlainPresenter;

impl Presenter for PlainPresenter {
    fn present(&mut self, event: TurnEvent) {
        if let TurnEvent::Error { message } = event {
            eprintln!("Error: {}", message);
        }
    }
}
