use std::process::{Command, Stdio};
use std::thread;

use tracing::warn;

use super::{Notifier, Permission};
use crate::error::SideEffectError;

/// Desktop notifications through the platform's notification helper:
/// `notify-send` on Linux, `osascript` on macOS.
///
/// Permission counts as granted when the helper can be run. `notify`
/// returns once the helper is spawned; its exit status is only logged.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    fn command(&self, title: &str, body: &str) -> Option<Command> {
        if cfg!(target_os = "linux") {
            let mut cmd = Command::new("notify-send");
            cmd.args(["--app-name", self.app_name.as_str(), title, body]);
            Some(cmd)
        } else if cfg!(target_os = "macos") {
            let script = format!(
                "display notification \"{}\" with title \"{}\"",
                escape_applescript(body),
                escape_applescript(title)
            );
            let mut cmd = Command::new("osascript");
            cmd.args(["-e", script.as_str()]);
            Some(cmd)
        } else {
            None
        }
    }

    fn probe() -> Option<Command> {
        if cfg!(target_os = "linux") {
            let mut cmd = Command::new("notify-send");
            cmd.arg("--version");
            Some(cmd)
        } else if cfg!(target_os = "macos") {
            let mut cmd = Command::new("osascript");
            cmd.args(["-e", "return"]);
            Some(cmd)
        } else {
            None
        }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new("focuskit")
    }
}

impl Notifier for DesktopNotifier {
    fn request_permission(&self) -> Permission {
        let Some(mut probe) = Self::probe() else {
            return Permission::Denied;
        };
        match probe.stdout(Stdio::null()).stderr(Stdio::null()).status() {
            Ok(status) if status.success() => Permission::Granted,
            _ => Permission::Denied,
        }
    }

    fn notify(&self, title: &str, body: &str) -> Result<(), SideEffectError> {
        let cmd = self
            .command(title, body)
            .ok_or_else(|| SideEffectError::Unavailable("no notification helper on this platform".into()))?;
        spawn_detached(cmd)
    }
}

/// Never notifies and always reports denied permission.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn request_permission(&self) -> Permission {
        Permission::Denied
    }

    fn notify(&self, _title: &str, _body: &str) -> Result<(), SideEffectError> {
        Ok(())
    }
}

/// Start `cmd` and return without waiting for it to exit.
///
/// The helper may wait on the notification daemon; it is reaped on a
/// separate thread and its exit status is only logged.
fn spawn_detached(mut cmd: Command) -> Result<(), SideEffectError> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| SideEffectError::Unavailable(e.to_string()))?;

    thread::Builder::new()
        .name("notify-reaper".to_string())
        .spawn(move || match child.wait() {
            Ok(status) if status.success() => {}
            Ok(status) => warn!(%status, "notification helper exited with failure"),
            Err(e) => warn!(error = %e, "failed to wait for notification helper"),
        })
        .map(|_| ())
        .map_err(|e| SideEffectError::Failed(e.to_string()))
}

fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
