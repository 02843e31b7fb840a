//! Fire-and-forget completion sounds.
//!
//! The reader holds the foreground for the whole session, so the user is
//! usually looking at something else when it finishes. A system sound is
//! the notification channel that works without stealing focus back.
//!
//! Playback must never block or be awaited by the session flow: the child
//! process is spawned and forgotten, and every failure is ignored — a
//! missing sound is not worth a warning, let alone an error.

use std::process::Command;

/// Plays notification sounds. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn success(&self);
    fn failure(&self);
}

/// [`Notifier`] backed by the macOS `afplay` command and the stock system
/// sounds.
pub struct SystemNotifier;

impl SystemNotifier {
    fn play(path: &str) {
        // Spawn-and-forget: no wait, no error handling.
        let _ = Command::new("afplay").arg(path).spawn();
    }
}

impl Notifier for SystemNotifier {
    fn success(&self) {
        Self::play("/System/Library/Sounds/Glass.aiff");
    }

    fn failure(&self) {
        Self::play("/System/Library/Sounds/Basso.aiff");
    }
}

/// Silent [`Notifier`] for tests and `--no-sound`.
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn success(&self) {}
    fn failure(&self) {}
}
