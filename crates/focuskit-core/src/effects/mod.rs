//! Completion side effects: session persistence, audio cue and system
//! notification.
//!
//! Each effect is best-effort and isolated. The engine commits its phase
//! transition before any of them runs, and their failures only show up in
//! the [`CompletionReport`] and the log.

mod adapter;
mod audio;
mod desktop;
mod log;

pub use adapter::{Completion, CompletionAdapter};
pub use audio::{SilentCue, TerminalBell};
#[cfg(feature = "tone")]
pub use audio::ToneCue;
pub use desktop::{DesktopNotifier, NoopNotifier};
pub use log::{CompletionReport, EffectKind, EffectResult, EffectStatus};

use serde::{Deserialize, Serialize};

use crate::error::SideEffectError;

/// Answer to a notification permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
}

/// Short audible signal played when a phase ends.
pub trait AudioCue {
    fn play_cue(&self) -> Result<(), SideEffectError>;
}

/// Host system notifications.
pub trait Notifier {
    fn request_permission(&self) -> Permission;

    fn notify(&self, title: &str, body: &str) -> Result<(), SideEffectError>;
}
