use embassy_futures::yield_now;
use sequencer_core::PowerController;

use super::BoardIo;
use crate::telemetry::TransitionLog;

#[embassy_executor::task]
pub async fn run(
    mut controller: PowerController<'static>,
    mut io: BoardIo,
    mut log: TransitionLog,
) -> ! {
    let mut reported_write_errors = 0;
    loop {
        if let Some(transition) = controller.step(&mut io) {
            log.record(transition, controller.timers().uptime_ticks());
        }

        let write_errors = io.write_errors();
        if write_errors != reported_write_errors {
            defmt::warn!("output writes rejected: {} total", write_errors);
            reported_write_errors = write_errors;
        }

        yield_now().await;
    }
}
