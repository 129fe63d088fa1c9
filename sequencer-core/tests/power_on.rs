mod common;

use common::{Board, cycle, leak_timers, run_cycles, tap};
use sequencer_core::outputs::{LedTarget, RelayTarget};
use sequencer_core::timing::{SAFETY_START_TIME, ticks_for_coarse_units};
use sequencer_core::{PowerController, SequencerState, TransitionCause};

#[test]
fn first_iteration_renders_everything_off() {
    let timers = leak_timers();
    let mut controller = PowerController::new(timers);
    let mut board = Board::new();

    assert_eq!(controller.step(&mut board), None);
    assert_eq!(board.led, Some(false));
    assert_eq!(board.relay, Some(false));

    run_cycles(&mut controller, &mut board, 20);
    assert_eq!(board.led_writes, 1);
    assert_eq!(board.relay_writes, 1);
    assert_eq!(controller.state(), SequencerState::Idle);
}

#[test]
fn press_then_release_closes_relay_and_arms_boot_timer() {
    let timers = leak_timers();
    let mut controller = PowerController::new(timers);
    let mut board = Board::new();

    let causes: Vec<_> = tap(&mut controller, &mut board)
        .iter()
        .map(|t| t.cause)
        .collect();
    assert_eq!(
        causes,
        [TransitionCause::ButtonPressed, TransitionCause::ButtonReleased]
    );

    let status = controller.status();
    assert_eq!(status.state, SequencerState::PowerOnWait);
    assert_eq!(status.relay, RelayTarget::On);
    assert_eq!(status.led, LedTarget::Flash);
    assert_eq!(status.timers.safety, SAFETY_START_TIME);

    // Targets are rendered at the top of the next iteration.
    assert!(!board.relay_closed());
    cycle(&mut controller, &mut board);
    assert!(board.relay_closed());
    assert_eq!(board.led, Some(true));
}

#[test]
fn long_hold_does_not_power_on_until_release() {
    let timers = leak_timers();
    let mut controller = PowerController::new(timers);
    let mut board = Board::new();

    board.button_pressed = true;
    let transitions = run_cycles(&mut controller, &mut board, 300);
    assert_eq!(transitions.len(), 1);
    assert_eq!(controller.state(), SequencerState::PowerOnStart);
    assert!(!board.relay_closed());

    board.button_pressed = false;
    run_cycles(&mut controller, &mut board, 2);
    assert_eq!(controller.state(), SequencerState::PowerOnWait);
    assert!(board.relay_closed());
}

#[test]
fn boot_timeout_removes_power() {
    let timers = leak_timers();
    let mut controller = PowerController::new(timers);
    let mut board = Board::new();

    tap(&mut controller, &mut board);
    let span = ticks_for_coarse_units(SAFETY_START_TIME);

    let early = run_cycles(&mut controller, &mut board, span - 1);
    assert!(early.is_empty());
    assert_eq!(controller.state(), SequencerState::PowerOnWait);
    assert!(board.relay_closed());

    let expiry = cycle(&mut controller, &mut board).expect("timeout transition");
    assert_eq!(expiry.cause, TransitionCause::BootTimeout);
    assert_eq!(expiry.to, SequencerState::Idle);

    cycle(&mut controller, &mut board);
    assert!(!board.relay_closed());
    assert_eq!(board.led, Some(false));
    assert_eq!(board.shutdown_request, Some(false));
    assert_eq!(controller.status().timers.safety, 0);
}

#[test]
fn rejected_relay_release_is_retried_after_boot_timeout() {
    let timers = leak_timers();
    let mut controller = PowerController::new(timers);
    let mut board = Board::new();

    tap(&mut controller, &mut board);
    let span = ticks_for_coarse_units(SAFETY_START_TIME);
    let transitions = run_cycles(&mut controller, &mut board, span);
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0].cause, TransitionCause::BootTimeout);
    assert!(board.relay_closed());

    board.rejected_relay_writes = 1;
    cycle(&mut controller, &mut board);
    assert!(board.relay_closed(), "rejected write leaves the relay closed");

    cycle(&mut controller, &mut board);
    assert!(!board.relay_closed());
    assert_eq!(controller.state(), SequencerState::Idle);

    let writes = board.relay_writes;
    run_cycles(&mut controller, &mut board, 20);
    assert_eq!(board.relay_writes, writes);
}

#[test]
fn confirmation_before_timeout_reaches_power_on() {
    let timers = leak_timers();
    let mut controller = PowerController::new(timers);
    let mut board = Board::new();

    tap(&mut controller, &mut board);
    run_cycles(&mut controller, &mut board, 1_000);
    assert_eq!(controller.state(), SequencerState::PowerOnWait);

    board.sbc_running = true;
    let transition = cycle(&mut controller, &mut board).expect("sbc running");
    assert_eq!(transition.cause, TransitionCause::SbcRunning);

    let status = controller.status();
    assert_eq!(status.state, SequencerState::PowerOn);
    assert_eq!(status.led, LedTarget::On);
    assert_eq!(status.timers.safety, 0);

    let later = run_cycles(&mut controller, &mut board, 50_000);
    assert!(later.is_empty(), "disarmed timer must not expire");
    assert!(board.relay_closed());
    assert_eq!(board.led, Some(true));
}

#[test]
fn led_flashes_at_half_period_while_waiting_for_boot() {
    let timers = leak_timers();
    let mut controller = PowerController::new(timers);
    let mut board = Board::new();

    tap(&mut controller, &mut board);
    let before = board.led_writes;
    run_cycles(&mut controller, &mut board, 1_000);

    // 10 s of flashing at one toggle per ~0.5 s.
    let toggles = board.led_writes - before;
    assert!((19..=21).contains(&toggles), "unexpected toggle count {toggles}");
}
