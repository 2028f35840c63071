use std::io::Write;

use super::AudioCue;
use crate::error::SideEffectError;

/// Rings the terminal bell on stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalBell;

impl AudioCue for TerminalBell {
    fn play_cue(&self) -> Result<(), SideEffectError> {
        let mut stderr = std::io::stderr().lock();
        stderr
            .write_all(b"\x07")
            .and_then(|()| stderr.flush())
            .map_err(|e| SideEffectError::Failed(e.to_string()))
    }
}

/// Plays nothing. For hosts without audio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentCue;

impl AudioCue for SilentCue {
    fn play_cue(&self) -> Result<(), SideEffectError> {
        Ok(())
    }
}

#[cfg(feature = "tone")]
pub use tone::ToneCue;

#[cfg(feature = "tone")]
mod tone {
    use std::thread;
    use std::time::Duration;

    use rodio::source::{SineWave, Source};
    use rodio::{OutputStream, Sink};
    use tracing::warn;

    use super::AudioCue;
    use crate::error::SideEffectError;

    /// Two-note sine chime synthesized on the default output device.
    ///
    /// Playback happens on a detached thread so the caller never waits for
    /// the device; device errors surface in the log only.
    #[derive(Debug, Clone)]
    pub struct ToneCue {
        notes_hz: Vec<f32>,
        note_length: Duration,
        volume: f32,
    }

    impl Default for ToneCue {
        fn default() -> Self {
            Self {
                notes_hz: vec![880.0, 660.0],
                note_length: Duration::from_millis(180),
                volume: 0.2,
            }
        }
    }

    impl ToneCue {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl AudioCue for ToneCue {
        fn play_cue(&self) -> Result<(), SideEffectError> {
            let notes = self.notes_hz.clone();
            let note_length = self.note_length;
            let volume = self.volume;

            thread::Builder::new()
                .name("completion-cue".to_string())
                .spawn(move || {
                    let (_stream, handle) = match OutputStream::try_default() {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "no audio output device");
                            return;
                        }
                    };
                    let sink = match Sink::try_new(&handle) {
                        Ok(sink) => sink,
                        Err(e) => {
                            warn!(error = %e, "failed to create audio sink");
                            return;
                        }
                    };
                    for hz in notes {
                        sink.append(SineWave::new(hz).take_duration(note_length).amplify(volume));
                    }
                    sink.sleep_until_end();
                })
                .map(|_| ())
                .map_err(|e| SideEffectError::Unavailable(e.to_string()))
        }
    }
}
