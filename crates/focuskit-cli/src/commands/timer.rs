use std::io::{BufRead, IsTerminal};
use std::rc::Rc;
use std::time::Duration;

use clap::Subcommand;
use focuskit_core::effects::DesktopNotifier;
use focuskit_core::{
    CompletionAdapter, ConfigStore, Database, Event, Phase, SessionEngine, TaskDirectory, TaskRef,
};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

const HELP: &str = "commands: p = pause/resume, r = reset, f/s/l = switch to focus/short/long, \
                    c = commit elapsed and reset, q = quit";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run an interactive focus session
    Run {
        /// Task ID to record sessions against
        #[arg(long)]
        task: Option<String>,
        /// Exit after this many completed phases
        #[arg(long)]
        cycles: Option<u32>,
        /// Tick interval in milliseconds (one tick = one timer second)
        #[arg(long, default_value = "1000", hide = true)]
        tick_ms: u64,
    },
    /// Print the initial timer state as JSON
    Status,
}

enum Control {
    Continue,
    Quit,
}

fn build_engine(db: &Rc<Database>) -> SessionEngine {
    let settings = ConfigStore::open(Rc::clone(db));
    let adapter = with_cue(CompletionAdapter::new(Rc::clone(db)))
        .with_notifier(DesktopNotifier::new("focuskit"));
    SessionEngine::new(settings, adapter)
}

#[cfg(feature = "tone")]
fn with_cue(adapter: CompletionAdapter) -> CompletionAdapter {
    adapter.with_audio(focuskit_core::effects::ToneCue::new())
}

#[cfg(not(feature = "tone"))]
fn with_cue(adapter: CompletionAdapter) -> CompletionAdapter {
    adapter.with_audio(focuskit_core::effects::TerminalBell)
}

fn print_event(event: &Event) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

fn render_status(engine: &SessionEngine) {
    if !std::io::stderr().is_terminal() {
        return;
    }
    let secs = engine.remaining_secs();
    let state = if engine.is_running() { "" } else { " (paused)" };
    eprint!(
        "\r\x1b[2K{} {:02}:{:02}{} | completed focus: {}",
        engine.phase().label(),
        secs / 60,
        secs % 60,
        state,
        engine.completed_focus_phases()
    );
}

fn handle_command(
    engine: &mut SessionEngine,
    command: &str,
) -> Result<Control, Box<dyn std::error::Error>> {
    let event = match command {
        "" => None,
        "p" => {
            if engine.is_running() {
                engine.pause()
            } else {
                engine.start()
            }
        }
        "r" => engine.reset(),
        "f" => engine.switch_to(Phase::Focus),
        "s" => engine.switch_to(Phase::ShortBreak),
        "l" => engine.switch_to(Phase::LongBreak),
        "c" => engine.stop_and_commit(),
        "q" => return Ok(Control::Quit),
        other => {
            eprintln!("unknown command '{other}'; {HELP}");
            None
        }
    };
    if let Some(event) = event {
        print_event(&event)?;
    }
    Ok(Control::Continue)
}

/// Forward stdin lines from a dedicated thread.
///
/// Blocking reads stay off the runtime. The thread is abandoned when the
/// session ends.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "failed to start stdin reader; keyboard commands disabled");
    }
    rx
}

async fn run_session(
    task: Option<String>,
    cycles: Option<u32>,
    tick_ms: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = Rc::new(Database::open()?);
    let mut engine = build_engine(&db);

    if let Some(id) = task {
        let task_ref = TaskRef::new(id);
        match db.find(&task_ref)? {
            Some(found) => info!(task = %task_ref, title = %found.title, "task associated"),
            None => warn!(task = %task_ref, "task not found; recording the reference as given"),
        }
        print_event(&engine.associate_task(Some(task_ref)))?;
    }

    if std::io::stdin().is_terminal() {
        eprintln!("{HELP}");
    }
    if let Some(event) = engine.start() {
        print_event(&event)?;
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(tick_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of an interval completes immediately.
    ticker.tick().await;

    let mut commands = spawn_stdin_reader();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut completions = 0u32;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(event) = engine.tick() {
                    if std::io::stderr().is_terminal() {
                        eprintln!();
                    }
                    print_event(&event)?;
                    if matches!(event, Event::PhaseCompleted { .. }) {
                        completions += 1;
                        if cycles.is_some_and(|n| completions >= n) {
                            break;
                        }
                    }
                }
                render_status(&engine);
            }
            line = commands.recv(), if stdin_open => {
                match line {
                    None => stdin_open = false,
                    Some(command) => {
                        if let Control::Quit = handle_command(&mut engine, command.trim())? {
                            break;
                        }
                    }
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    if std::io::stderr().is_terminal() {
        eprintln!();
    }
    if let Some(event) = engine.stop_and_commit() {
        print_event(&event)?;
    }
    Ok(())
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimerAction::Run {
            task,
            cycles,
            tick_ms,
        } => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(run_session(task, cycles, tick_ms))
        }
        TimerAction::Status => {
            let db = Rc::new(Database::open()?);
            let engine = build_engine(&db);
            println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
            Ok(())
        }
    }
}
