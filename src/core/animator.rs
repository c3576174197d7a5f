//! Paces streamed text for display.
//!
//! Network chunks land in a pending buffer in arrival order. Every step
//! moves roughly 1/60th of whatever is pending (at least one character) into
//! the finalized text, so bursts are smoothed out and a large backlog still
//! drains in a bounded number of steps.

use crate::core::constants::ANIMATION_DRAIN_DIVISOR;

/// Text released by one animation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationFrame {
    pub delta: String,
}

#[derive(Debug, Default, Clone)]
pub struct OutputAnimator {
    finalized: String,
    pending: String,
}

impl OutputAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) {
        self.pending.push_str(chunk);
    }

    pub fn finalized(&self) -> &str {
        &self.finalized
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Total text received so far, whether or not it has been shown.
    pub fn total_len(&self) -> usize {
        self.finalized.len() + self.pending.len()
    }

    /// Number of characters the next step will release.
    pub fn slice_len(&self) -> usize {
        let pending_chars = self.pending.chars().count();
        slice_len_for(pending_chars)
    }

    /// Release the next slice of pending text, if any.
    pub fn step(&mut self) -> Option<AnimationFrame> {
        if self.pending.is_empty() {
            return None;
        }

        let take = self.slice_len();
        let split_at = self
            .pending
            .char_indices()
            .nth(take)
            .map(|(index, _)| index)
            .unwrap_or(self.pending.len());

        let delta: String = self.pending.drain(..split_at).collect();
        self.finalized.push_str(&delta);
        Some(AnimationFrame { delta })
    }

    /// Move everything still pending into the finalized text at once.
    pub fn flush(&mut self) -> Option<AnimationFrame> {
        if self.pending.is_empty() {
            return None;
        }
        let delta = std::mem::take(&mut self.pending);
        self.finalized.push_str(&delta);
        Some(AnimationFrame { delta })
    }

    /// Consume the animator and return all text, pending included.
    pub fn into_text(mut self) -> String {
        self.finalized.push_str(&self.pending);
        self.finalized
    }
}

/// `max(1, round(pending / 60))`, rounding halves up.
pub fn slice_len_for(pending_chars: usize) -> usize {
    let half = ANIMATION_DRAIN_DIVISOR / 2;
    ((pending_chars + half) / ANIMATION_DRAIN_DIVISOR).max(1)
}
