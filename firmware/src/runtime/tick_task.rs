use embassy_time::{Duration, Ticker};
use sequencer_core::TimerBank;
use sequencer_core::timing::TICK_PERIOD;

#[allow(clippy::cast_possible_truncation)]
const TICK: Duration = Duration::from_micros(TICK_PERIOD.as_micros() as u64);

/// Advances the shared timer bank once per tick.
///
/// Runs on the same thread executor as the sequencer task, whose input
/// settle wait blocks for 1.5 ms. A tick can therefore land up to one settle
/// late; `Ticker` schedules from the previous deadline, so late ticks catch
/// up and none are dropped.
#[embassy_executor::task]
pub async fn run(timers: &'static TimerBank) -> ! {
    let mut ticker = Ticker::every(TICK);
    loop {
        ticker.next().await;
        timers.tick();
    }
}
