use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_time::Delay;
use sequencer_core::io::PinIo;
use sequencer_core::{PowerController, TimerBank};

use crate::telemetry::TransitionLog;

mod sequencer_task;
mod tick_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Board pins wired to the sequencer.
pub(super) type BoardIo = PinIo<
    Input<'static>,
    Input<'static>,
    Output<'static>,
    Output<'static>,
    Output<'static>,
    Delay,
>;

/// Countdowns shared by the tick task and the sequencer task.
pub(super) static TIMERS: TimerBank = TimerBank::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0, PA1, PA2, PA3, PA4, ..
    } = hal::init(config);

    // Outputs start inactive so the relay stays open through reset.
    let io: BoardIo = PinIo::new(
        Input::new(PA3, Pull::Up),
        Input::new(PA4, Pull::None),
        Output::new(PA0, Level::Low, Speed::Low),
        Output::new(PA2, Level::Low, Speed::Low),
        Output::new(PA1, Level::Low, Speed::Low),
        Delay,
    );

    let controller = PowerController::new(&TIMERS);
    defmt::info!("sbc-power-switch: starting in {}", controller.state());

    spawner
        .spawn(tick_task::run(&TIMERS))
        .expect("failed to spawn tick task");

    spawner
        .spawn(sequencer_task::run(controller, io, TransitionLog::new()))
        .expect("failed to spawn sequencer task");

    core::future::pending::<()>().await;
}
