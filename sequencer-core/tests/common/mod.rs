#![allow(dead_code)]

use sequencer_core::io::{InputLine, LineLevel, OutputLine, PowerIo};
use sequencer_core::{PowerController, TimerBank, Transition};

/// Simulated board: input levels set by the test, output writes counted.
#[derive(Debug)]
pub struct Board {
    pub button_pressed: bool,
    pub sbc_running: bool,
    pub led: Option<bool>,
    pub relay: Option<bool>,
    pub shutdown_request: Option<bool>,
    pub led_writes: usize,
    pub relay_writes: usize,
    /// Relay writes still to be rejected before the line accepts one.
    pub rejected_relay_writes: usize,
}

impl Board {
    pub fn new() -> Self {
        Self {
            button_pressed: false,
            sbc_running: false,
            led: None,
            relay: None,
            shutdown_request: None,
            led_writes: 0,
            relay_writes: 0,
            rejected_relay_writes: 0,
        }
    }

    pub fn relay_closed(&self) -> bool {
        self.relay == Some(true)
    }
}

impl PowerIo for Board {
    fn sample(&mut self, line: InputLine) -> LineLevel {
        match line {
            InputLine::Button => LineLevel::from_high(!self.button_pressed),
            InputLine::Confirmation => LineLevel::from_high(self.sbc_running),
        }
    }

    fn settle(&mut self) {}

    fn drive(&mut self, line: OutputLine, active: bool) -> bool {
        match line {
            OutputLine::Led => {
                self.led = Some(active);
                self.led_writes += 1;
            }
            OutputLine::Relay if self.rejected_relay_writes > 0 => {
                self.rejected_relay_writes -= 1;
                return false;
            }
            OutputLine::Relay => {
                self.relay = Some(active);
                self.relay_writes += 1;
            }
            OutputLine::ShutdownRequest => self.shutdown_request = Some(active),
        }
        true
    }
}

/// Advances the timer bank by one tick, then runs one loop iteration.
pub fn cycle(
    controller: &mut PowerController<'_>,
    board: &mut Board,
) -> Option<Transition> {
    controller.timers().tick();
    controller.step(board)
}

/// Runs `count` tick + iteration cycles, collecting every transition.
pub fn run_cycles(
    controller: &mut PowerController<'_>,
    board: &mut Board,
    count: u32,
) -> Vec<Transition> {
    (0..count)
        .filter_map(|_| cycle(controller, board))
        .collect()
}

/// Presses and releases the button, one iteration each.
pub fn tap(controller: &mut PowerController<'_>, board: &mut Board) -> Vec<Transition> {
    board.button_pressed = true;
    let mut transitions = run_cycles(controller, board, 1);
    board.button_pressed = false;
    transitions.extend(run_cycles(controller, board, 1));
    transitions
}

pub fn leak_timers() -> &'static TimerBank {
    Box::leak(Box::new(TimerBank::new()))
}
