use std::cell::Cell;

use tracing::{debug, warn};

use super::log::{CompletionReport, EffectKind, EffectResult, EffectStatus};
use super::{AudioCue, Notifier, NoopNotifier, Permission, SilentCue};
use crate::storage::{Configuration, SessionRecord, SessionSink};
use crate::timer::Phase;

/// What just happened at a phase boundary.
#[derive(Debug, Clone, Copy)]
pub struct Completion<'a> {
    pub record: &'a SessionRecord,
    pub next_phase: Phase,
    pub next_duration_min: u32,
    pub auto_started: bool,
}

/// Runs the completion sub-effects, each in its own failure domain.
pub struct CompletionAdapter {
    sink: Box<dyn SessionSink>,
    audio: Box<dyn AudioCue>,
    notifier: Box<dyn Notifier>,
    /// Cached answer of the first permission request.
    permission: Cell<Option<Permission>>,
}

impl CompletionAdapter {
    /// Adapter that persists into `sink` with silent audio and no notifications.
    pub fn new(sink: impl SessionSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            audio: Box::new(SilentCue),
            notifier: Box::new(NoopNotifier),
            permission: Cell::new(None),
        }
    }

    pub fn with_audio(mut self, audio: impl AudioCue + 'static) -> Self {
        self.audio = Box::new(audio);
        self
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self.permission.set(None);
        self
    }

    /// Hand `record` to the sink. Failures are logged, never returned.
    pub fn persist(&self, record: &SessionRecord) -> EffectStatus {
        match self.sink.record_session(record) {
            Ok(()) => {
                debug!(id = %record.id, phase = record.phase.as_str(), "session recorded");
                EffectStatus::Success
            }
            Err(e) => {
                warn!(id = %record.id, error = %e, "failed to record session");
                EffectStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Run persistence, sound and notification for one completion.
    pub fn run(&self, completion: &Completion<'_>, config: &Configuration) -> CompletionReport {
        let persist = self.persist(completion.record);
        let sound = self.play_sound(config);
        let notification = self.send_notification(completion, config);

        CompletionReport::new(vec![
            EffectResult {
                effect: EffectKind::Persist,
                status: persist,
            },
            EffectResult {
                effect: EffectKind::Sound,
                status: sound,
            },
            EffectResult {
                effect: EffectKind::Notification,
                status: notification,
            },
        ])
    }

    fn play_sound(&self, config: &Configuration) -> EffectStatus {
        if !config.sound_enabled {
            return EffectStatus::Skipped {
                reason: "sound disabled".to_string(),
            };
        }
        match self.audio.play_cue() {
            Ok(()) => EffectStatus::Success,
            Err(e) => {
                warn!(error = %e, "audio cue failed");
                EffectStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn send_notification(&self, completion: &Completion<'_>, config: &Configuration) -> EffectStatus {
        if !config.notifications_enabled {
            return EffectStatus::Skipped {
                reason: "notifications disabled".to_string(),
            };
        }
        if self.permission() == Permission::Denied {
            return EffectStatus::Skipped {
                reason: "notification permission denied".to_string(),
            };
        }

        let (title, body) = notification_text(completion);
        match self.notifier.notify(&title, &body) {
            Ok(()) => EffectStatus::Success,
            Err(e) => {
                warn!(error = %e, "system notification failed");
                EffectStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn permission(&self) -> Permission {
        if let Some(permission) = self.permission.get() {
            return permission;
        }
        let permission = self.notifier.request_permission();
        debug!(?permission, "notification permission requested");
        self.permission.set(Some(permission));
        permission
    }
}

fn notification_text(completion: &Completion<'_>) -> (String, String) {
    let title = format!("{} complete", completion.record.phase.label());
    let next = format!(
        "{} ({} min)",
        completion.next_phase.label(),
        completion.next_duration_min
    );
    let body = if completion.auto_started {
        format!("{next} starts now.")
    } else {
        format!("{next} is up next. Start it when you're ready.")
    };
    (title, body)
}
