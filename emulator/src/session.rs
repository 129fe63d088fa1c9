use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::mem;
use std::path::Path;
use std::str::SplitWhitespace;
use std::time::Duration;

use sequencer_core::io::{InputLine, LineLevel, OutputLine, PowerIo};
use sequencer_core::telemetry::TelemetryRecorder;
use sequencer_core::timing::TICK_PERIOD;
use sequencer_core::{PowerController, TimerBank};

/// Boot time of the simulated SBC in auto mode.
pub const DEFAULT_BOOT_DELAY: Duration = Duration::from_secs(3);

/// Halt time of the simulated SBC once shutdown is requested.
pub const DEFAULT_HALT_DELAY: Duration = Duration::from_secs(2);

/// Longest duration accepted on the command line.
const MAX_DURATION: Duration = Duration::from_secs(3_600);

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "press",
        "press                          - hold the pushbutton down (runs one tick)",
    ),
    (
        "release",
        "release                        - let go of the pushbutton (runs one tick)",
    ),
    (
        "tap",
        "tap                            - press then release the pushbutton",
    ),
    (
        "sbc",
        "sbc up|down|manual|auto [boot=<dur>] [halt=<dur>] - drive the simulated SBC",
    ),
    (
        "advance",
        "advance <dur>                  - run the virtual clock, e.g. `advance 500ms`",
    ),
    (
        "status",
        "status                         - display controller, timer and SBC state",
    ),
    (
        "log",
        "log                            - list recorded transitions",
    ),
    (
        "help",
        "help [topic]                   - show help for a command",
    ),
];

/// Rejected REPL input.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CommandError {
    Unknown(String),
    MissingArgument(&'static str),
    UnexpectedArgument(String),
    UnknownOption(String),
    InvalidDuration(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Unknown(command) => write!(f, "unknown-command `{command}`"),
            CommandError::MissingArgument(what) => write!(f, "missing-argument {what}"),
            CommandError::UnexpectedArgument(arg) => write!(f, "unexpected-argument `{arg}`"),
            CommandError::UnknownOption(option) => write!(f, "unknown-option `{option}`"),
            CommandError::InvalidDuration(text) => {
                write!(f, "invalid-duration `{text}` (expected <n>ms or <n>s, at most 1h)")
            }
        }
    }
}

impl std::error::Error for CommandError {}

/// Parsed REPL command.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command<'a> {
    Press,
    Release,
    Tap,
    Sbc(SbcCommand),
    Advance(Duration),
    Status,
    Log,
    Help(Option<&'a str>),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SbcCommand {
    Up,
    Down,
    Manual,
    Auto {
        boot: Option<Duration>,
        halt: Option<Duration>,
    },
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let head = words.next().ok_or(CommandError::MissingArgument("command"))?;

        let command = match head.to_ascii_lowercase().as_str() {
            "press" => Command::Press,
            "release" => Command::Release,
            "tap" => Command::Tap,
            "sbc" => Command::Sbc(parse_sbc(&mut words)?),
            "advance" => {
                let value = words
                    .next()
                    .ok_or(CommandError::MissingArgument("duration"))?;
                Command::Advance(parse_duration(value)?)
            }
            "status" => Command::Status,
            "log" => Command::Log,
            "help" => Command::Help(words.next()),
            _ => return Err(CommandError::Unknown(head.to_string())),
        };

        match words.next() {
            Some(extra) => Err(CommandError::UnexpectedArgument(extra.to_string())),
            None => Ok(command),
        }
    }
}

fn parse_sbc(words: &mut SplitWhitespace<'_>) -> Result<SbcCommand, CommandError> {
    let mode = words.next().ok_or(CommandError::MissingArgument("sbc mode"))?;
    match mode.to_ascii_lowercase().as_str() {
        "up" => Ok(SbcCommand::Up),
        "down" => Ok(SbcCommand::Down),
        "manual" => Ok(SbcCommand::Manual),
        "auto" => {
            let mut boot = None;
            let mut halt = None;
            for option in words.by_ref() {
                match option.split_once('=') {
                    Some(("boot", value)) => boot = Some(parse_duration(value)?),
                    Some(("halt", value)) => halt = Some(parse_duration(value)?),
                    _ => return Err(CommandError::UnknownOption(option.to_string())),
                }
            }
            Ok(SbcCommand::Auto { boot, halt })
        }
        _ => Err(CommandError::UnexpectedArgument(mode.to_string())),
    }
}

/// Parses `<n>ms` or `<n>s`.
pub fn parse_duration(text: &str) -> Result<Duration, CommandError> {
    let invalid = || CommandError::InvalidDuration(text.to_string());
    let (digits, unit) = if let Some(digits) = text.strip_suffix("ms") {
        (digits, Duration::from_millis(1))
    } else if let Some(digits) = text.strip_suffix('s') {
        (digits, Duration::from_secs(1))
    } else {
        return Err(invalid());
    };

    let count: u32 = digits.parse().map_err(|_| invalid())?;
    let duration = unit * count;
    if duration > MAX_DURATION {
        return Err(invalid());
    }
    Ok(duration)
}

/// Whole ticks covering `duration`, rounding up.
fn ticks_for(duration: Duration) -> u32 {
    let ticks = duration.as_nanos().div_ceil(TICK_PERIOD.as_nanos());
    u32::try_from(ticks).unwrap_or(u32::MAX)
}

fn ticks_to_duration(ticks: u32) -> Duration {
    TICK_PERIOD * ticks
}

/// Lifecycle of the simulated SBC in auto mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SbcPhase {
    Off,
    Booting { remaining: u32 },
    Running,
    Halting { remaining: u32 },
    Halted,
}

impl SbcPhase {
    fn confirms_running(self) -> bool {
        matches!(self, SbcPhase::Running | SbcPhase::Halting { .. })
    }
}

impl fmt::Display for SbcPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SbcPhase::Off => f.write_str("off"),
            SbcPhase::Booting { remaining } => {
                write!(f, "booting ({}ms left)", ticks_to_duration(*remaining).as_millis())
            }
            SbcPhase::Running => f.write_str("running"),
            SbcPhase::Halting { remaining } => {
                write!(f, "halting ({}ms left)", ticks_to_duration(*remaining).as_millis())
            }
            SbcPhase::Halted => f.write_str("halted"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SbcMode {
    /// Confirmation follows the relay and shutdown request with delays.
    Auto,
    /// Confirmation held at a fixed level.
    Manual,
}

/// Simulated single-board computer behind the relay.
#[derive(Clone, Debug)]
pub struct SbcModel {
    mode: SbcMode,
    phase: SbcPhase,
    manual_level: bool,
    boot_ticks: u32,
    halt_ticks: u32,
}

impl SbcModel {
    pub fn new() -> Self {
        Self {
            mode: SbcMode::Auto,
            phase: SbcPhase::Off,
            manual_level: false,
            boot_ticks: ticks_for(DEFAULT_BOOT_DELAY),
            halt_ticks: ticks_for(DEFAULT_HALT_DELAY),
        }
    }

    pub fn phase(&self) -> SbcPhase {
        self.phase
    }

    /// Level presented on the shutdown confirmation line.
    pub fn confirmation_high(&self) -> bool {
        match self.mode {
            SbcMode::Manual => self.manual_level,
            SbcMode::Auto => self.phase.confirms_running(),
        }
    }

    /// Switches to manual mode at a fixed level.
    pub fn force(&mut self, level: bool) {
        self.mode = SbcMode::Manual;
        self.manual_level = level;
    }

    /// Switches to manual mode, keeping the current level.
    pub fn hold(&mut self) {
        self.force(self.confirmation_high());
    }

    /// Switches to auto mode, optionally replacing the delays.
    pub fn automate(&mut self, boot: Option<Duration>, halt: Option<Duration>) {
        if let Some(boot) = boot {
            self.boot_ticks = ticks_for(boot);
        }
        if let Some(halt) = halt {
            self.halt_ticks = ticks_for(halt);
        }
        if self.mode == SbcMode::Manual {
            self.phase = if self.manual_level {
                SbcPhase::Running
            } else {
                SbcPhase::Off
            };
        }
        self.mode = SbcMode::Auto;
    }

    /// Advances the model by one tick against the current output levels.
    /// Returns the new phase when it changed kind.
    pub fn tick(&mut self, relay_closed: bool, shutdown_requested: bool) -> Option<SbcPhase> {
        if self.mode == SbcMode::Manual {
            return None;
        }

        let next = match self.phase {
            _ if !relay_closed => SbcPhase::Off,
            SbcPhase::Off => SbcPhase::Booting {
                remaining: self.boot_ticks,
            },
            SbcPhase::Booting { remaining } if remaining <= 1 => SbcPhase::Running,
            SbcPhase::Booting { remaining } => SbcPhase::Booting {
                remaining: remaining - 1,
            },
            SbcPhase::Running if shutdown_requested => SbcPhase::Halting {
                remaining: self.halt_ticks,
            },
            SbcPhase::Halting { remaining } if remaining <= 1 => SbcPhase::Halted,
            SbcPhase::Halting { remaining } => SbcPhase::Halting {
                remaining: remaining - 1,
            },
            phase @ (SbcPhase::Running | SbcPhase::Halted) => phase,
        };

        let changed = mem::discriminant(&next) != mem::discriminant(&self.phase);
        self.phase = next;
        changed.then_some(next)
    }
}

impl Default for SbcModel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SbcModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            SbcMode::Manual => write!(
                f,
                "manual confirmation={}",
                if self.manual_level { "high" } else { "low" }
            ),
            SbcMode::Auto => write!(
                f,
                "auto boot={}ms halt={}ms phase={}",
                ticks_to_duration(self.boot_ticks).as_millis(),
                ticks_to_duration(self.halt_ticks).as_millis(),
                self.phase
            ),
        }
    }
}

/// Host stand-in for the board: a pushbutton, the SBC model and three outputs.
struct HostBoard {
    button_pressed: bool,
    sbc: SbcModel,
    led: bool,
    relay: bool,
    shutdown_request: bool,
    pin_changes: Vec<(OutputLine, bool)>,
}

impl HostBoard {
    fn new() -> Self {
        Self {
            button_pressed: false,
            sbc: SbcModel::new(),
            led: false,
            relay: false,
            shutdown_request: false,
            pin_changes: Vec::new(),
        }
    }
}

impl PowerIo for HostBoard {
    fn sample(&mut self, line: InputLine) -> LineLevel {
        match line {
            InputLine::Button => LineLevel::from_high(!self.button_pressed),
            InputLine::Confirmation => LineLevel::from_high(self.sbc.confirmation_high()),
        }
    }

    fn settle(&mut self) {}

    fn drive(&mut self, line: OutputLine, active: bool) -> bool {
        let level = match line {
            OutputLine::Led => &mut self.led,
            OutputLine::Relay => &mut self.relay,
            OutputLine::ShutdownRequest => &mut self.shutdown_request,
        };
        if *level == active {
            return true;
        }
        *level = active;
        // The LED toggles every half second while flashing; too noisy to report.
        if line != OutputLine::Led {
            self.pin_changes.push((line, active));
        }
        true
    }
}

pub struct Session {
    controller: PowerController<'static>,
    board: HostBoard,
    telemetry: TelemetryRecorder,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    pub fn new(transcript: Option<&Path>) -> io::Result<Self> {
        let transcript = transcript.map(TranscriptLogger::new).transpose()?;
        // One bank per session; it lives as long as the process.
        let timers: &'static TimerBank = Box::leak(Box::new(TimerBank::new()));

        Ok(Self {
            controller: PowerController::new(timers),
            board: HostBoard::new(),
            telemetry: TelemetryRecorder::new(),
            transcript,
        })
    }

    pub fn controller(&self) -> &PowerController<'static> {
        &self.controller
    }

    pub fn sbc(&self) -> &SbcModel {
        &self.board.sbc
    }

    /// Virtual time since power-up.
    pub fn elapsed(&self) -> Duration {
        ticks_to_duration(self.controller.timers().uptime_ticks())
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.record(TranscriptRole::Host, &[trimmed.to_string()])?;

        let lines = match Command::parse(trimmed) {
            Ok(command) => self.execute(command),
            Err(err) => vec![format!("ERR {err}")],
        };

        self.record(TranscriptRole::Emulator, &lines)?;
        Ok(lines)
    }

    fn execute(&mut self, command: Command<'_>) -> Vec<String> {
        match command {
            Command::Press => self.set_button(true),
            Command::Release => self.set_button(false),
            Command::Tap => {
                let mut lines = self.set_button(true);
                lines.extend(self.set_button(false));
                lines
            }
            Command::Sbc(command) => self.handle_sbc(command),
            Command::Advance(duration) => {
                let ticks = ticks_for(duration);
                let mut lines = self.run_ticks(ticks);
                lines.push(format!(
                    "OK advanced {}ms ({ticks} ticks)",
                    duration.as_millis()
                ));
                lines
            }
            Command::Status => self.status_lines(),
            Command::Log => self.log_lines(),
            Command::Help(topic) => help_lines(topic),
        }
    }

    fn set_button(&mut self, pressed: bool) -> Vec<String> {
        self.board.button_pressed = pressed;
        let mut lines = self.run_ticks(1);
        lines.push(format!(
            "OK button {}",
            if pressed { "pressed" } else { "released" }
        ));
        lines
    }

    fn handle_sbc(&mut self, command: SbcCommand) -> Vec<String> {
        let sbc = &mut self.board.sbc;
        match command {
            SbcCommand::Up => sbc.force(true),
            SbcCommand::Down => sbc.force(false),
            SbcCommand::Manual => sbc.hold(),
            SbcCommand::Auto { boot, halt } => sbc.automate(boot, halt),
        }
        vec![format!("OK sbc {sbc}")]
    }

    /// One tick of the virtual clock followed by one main-loop iteration.
    fn run_ticks(&mut self, count: u32) -> Vec<String> {
        let mut lines = Vec::new();
        for _ in 0..count {
            let board = &mut self.board;
            if let Some(phase) = board.sbc.tick(board.relay, board.shutdown_request) {
                lines.push(format!("SBC {phase}"));
            }

            self.controller.timers().tick();
            let transition = self.controller.step(&mut self.board);

            for (line, active) in self.board.pin_changes.drain(..) {
                lines.push(format!(
                    "PIN {} {}",
                    line.signal().name,
                    if active { "on" } else { "off" }
                ));
            }

            if let Some(transition) = transition {
                let at = self.controller.timers().uptime_ticks();
                let record = self.telemetry.record(transition, at);
                let tag = if transition.cause.is_timeout() {
                    "WARN"
                } else {
                    "EVT"
                };
                lines.push(format!("{tag} {record}"));
            }
        }
        lines
    }

    fn status_lines(&self) -> Vec<String> {
        let status = self.controller.status();
        vec![
            format!(
                "state={} uptime=+{}ms",
                status.state,
                ticks_to_duration(status.uptime_ticks).as_millis()
            ),
            format!(
                "led={} ({}) relay={} shutdown-request={}",
                status.led,
                if status.led_lit { "lit" } else { "dark" },
                status.relay,
                if status.shutdown_requested {
                    "asserted"
                } else {
                    "released"
                }
            ),
            format!(
                "timers safety={} prescaler={} flash={}",
                status.timers.safety, status.timers.prescaler, status.timers.flash
            ),
            format!(
                "button={} sbc={}",
                if self.board.button_pressed {
                    "pressed"
                } else {
                    "released"
                },
                self.board.sbc
            ),
        ]
    }

    fn log_lines(&self) -> Vec<String> {
        if self.telemetry.is_empty() {
            return vec!["log empty".to_string()];
        }
        let mut lines = vec![format!("transitions ({})", self.telemetry.len())];
        lines.extend(
            self.telemetry
                .oldest_first()
                .map(|record| format!("  {record}")),
        );
        lines
    }

    fn record(&mut self, role: TranscriptRole, lines: &[String]) -> io::Result<()> {
        let elapsed = self.elapsed();
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(elapsed, role, line)?;
            }
        }
        Ok(())
    }
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) if !target.is_empty() => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        _ => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

struct TranscriptLogger {
    writer: BufWriter<fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# SBC power switch emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are virtual milliseconds since power-up"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, elapsed: Duration, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

#[derive(Clone, Copy)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer_core::SequencerState;
    use sequencer_core::outputs::RelayTarget;

    fn run(session: &mut Session, line: &str) -> Vec<String> {
        session.handle_command(line).expect("no transcript I/O")
    }

    fn contains(lines: &[String], needle: &str) -> bool {
        lines.iter().any(|line| line.contains(needle))
    }

    #[test]
    fn parses_commands_and_options() {
        assert_eq!(Command::parse("TAP"), Ok(Command::Tap));
        assert_eq!(
            Command::parse("advance 1500ms"),
            Ok(Command::Advance(Duration::from_millis(1_500)))
        );
        assert_eq!(
            Command::parse("sbc auto boot=2s"),
            Ok(Command::Sbc(SbcCommand::Auto {
                boot: Some(Duration::from_secs(2)),
                halt: None,
            }))
        );
        assert_eq!(Command::parse("help sbc"), Ok(Command::Help(Some("sbc"))));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert_eq!(
            Command::parse("advance"),
            Err(CommandError::MissingArgument("duration"))
        );
        assert_eq!(
            Command::parse("advance 2min"),
            Err(CommandError::InvalidDuration("2min".to_string()))
        );
        assert_eq!(
            Command::parse("sbc auto delay=1s"),
            Err(CommandError::UnknownOption("delay=1s".to_string()))
        );
        assert_eq!(
            Command::parse("press twice"),
            Err(CommandError::UnexpectedArgument("twice".to_string()))
        );
        assert_eq!(
            Command::parse("reboot"),
            Err(CommandError::Unknown("reboot".to_string()))
        );
    }

    #[test]
    fn errors_are_reported_as_err_lines() {
        let mut session = Session::new(None).expect("session");
        assert_eq!(run(&mut session, "bogus"), ["ERR unknown-command `bogus`"]);
    }

    #[test]
    fn durations_round_up_to_whole_ticks() {
        assert_eq!(ticks_for(Duration::ZERO), 0);
        assert_eq!(ticks_for(Duration::from_millis(1)), 1);
        assert_eq!(ticks_for(Duration::from_millis(20)), 2);
        assert_eq!(ticks_for(Duration::from_millis(25)), 3);
    }

    #[test]
    fn auto_sbc_completes_a_power_cycle() {
        let mut session = Session::new(None).expect("session");

        let lines = run(&mut session, "tap");
        assert!(contains(&lines, "idle -> poweron-start (button-pressed)"));
        assert_eq!(session.controller().state(), SequencerState::PowerOnWait);

        let lines = run(&mut session, "advance 4s");
        assert!(contains(&lines, "PIN RELAY on"));
        assert!(contains(&lines, "SBC running"));
        assert!(contains(&lines, "poweron-wait -> poweron (sbc-running)"));
        assert_eq!(session.controller().state(), SequencerState::PowerOn);

        let lines = run(&mut session, "tap");
        assert!(contains(&lines, "PIN SHTDOUT on"));
        assert_eq!(session.controller().state(), SequencerState::PowerOffWait);

        let lines = run(&mut session, "advance 3s");
        assert!(contains(&lines, "SBC halted"));
        assert_eq!(session.controller().state(), SequencerState::PowerOff);

        let lines = run(&mut session, "advance 5s");
        assert!(contains(&lines, "poweroff -> idle (grace-elapsed)"));
        assert!(contains(&lines, "PIN RELAY off"));
        assert_eq!(session.controller().status().relay, RelayTarget::Off);
        assert_eq!(session.sbc().phase(), SbcPhase::Off);
    }

    #[test]
    fn silent_sbc_trips_the_boot_timeout() {
        let mut session = Session::new(None).expect("session");
        run(&mut session, "sbc down");
        run(&mut session, "tap");

        let lines = run(&mut session, "advance 101s");
        assert!(contains(&lines, "WARN"));
        assert!(contains(&lines, "(boot-timeout)"));
        assert_eq!(session.controller().state(), SequencerState::Idle);

        let log = run(&mut session, "log");
        assert_eq!(log[0], "transitions (3)");
    }

    #[test]
    fn manual_mode_holds_level_until_auto_resumes() {
        let mut sbc = SbcModel::new();
        sbc.force(true);
        assert_eq!(sbc.tick(false, false), None);
        assert!(sbc.confirmation_high());

        sbc.automate(Some(Duration::from_millis(30)), None);
        assert_eq!(sbc.phase(), SbcPhase::Running);
        assert_eq!(sbc.tick(false, false), Some(SbcPhase::Off));
        assert!(!sbc.confirmation_high());

        assert!(matches!(sbc.tick(true, false), Some(SbcPhase::Booting { remaining: 3 })));
        assert_eq!(sbc.tick(true, false), None);
        assert_eq!(sbc.tick(true, false), None);
        assert_eq!(sbc.tick(true, false), Some(SbcPhase::Running));
    }

    #[test]
    fn help_lists_topics() {
        let mut session = Session::new(None).expect("session");
        let lines = run(&mut session, "help tap");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("tap"));

        let lines = run(&mut session, "help nope");
        assert!(contains(&lines, "Available topics: press, release, tap"));
    }
}
