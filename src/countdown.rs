//! Deadline countdown evaluation and the ticking clock that drives it.
//!
//! Evaluation is a pure function of `(deadline, now)`; the ticker is an
//! explicitly owned periodic task that re-evaluates once per second and
//! immediately on deadline changes.

use crate::types::Timestamp;
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Fixed refresh period for live countdowns.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Live countdown display state, recomputed on every tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountdownState {
    /// Human-readable remaining-time label.
    pub display: String,
    /// False once the deadline has passed.
    pub is_active: bool,
    /// Raw time remaining; zero once the deadline has passed.
    pub time_remaining: Duration,
}

/// Evaluate a countdown against the current time.
///
/// Returns `None` when no deadline is set. The display keeps the two
/// coarsest non-zero units and has no seconds-level precision, so a
/// deadline under a minute away still reads "0m left".
pub fn evaluate(deadline: Option<Timestamp>, now: Timestamp) -> Option<CountdownState> {
    let deadline = deadline?;
    let diff = deadline.0 - now.0;

    if diff <= 0 {
        return Some(CountdownState {
            display: "Closed".to_string(),
            is_active: false,
            time_remaining: Duration::ZERO,
        });
    }

    let days = diff / DAY_MS;
    let hours = (diff % DAY_MS) / HOUR_MS;
    let minutes = (diff % HOUR_MS) / MINUTE_MS;

    let display = if days > 0 {
        format!("{}d {}h left", days, hours)
    } else if hours > 0 {
        format!("{}h {}m left", hours, minutes)
    } else {
        format!("{}m left", minutes)
    };

    Some(CountdownState {
        display,
        is_active: true,
        time_remaining: Duration::from_millis(diff as u64),
    })
}

enum Control {
    SetDeadline(Option<Timestamp>),
    Stop,
}

/// Owned periodic task that re-evaluates a countdown once per second.
///
/// Emits an initial state on start, one per tick thereafter, and one
/// immediately whenever the deadline is replaced. Cancellation is
/// synchronous: once [`CountdownTicker::cancel`] returns, no further
/// state is delivered.
pub struct CountdownTicker {
    control: Sender<Control>,
    states: Receiver<Option<CountdownState>>,
    worker: Option<JoinHandle<()>>,
}

impl CountdownTicker {
    /// Start a ticker for `deadline`.
    pub fn start(deadline: Option<Timestamp>) -> Self {
        let (control_tx, control_rx) = bounded::<Control>(16);
        let (state_tx, state_rx) = bounded(64);

        let worker = thread::spawn(move || {
            let ticker = tick(TICK_PERIOD);
            let mut deadline = deadline;

            // Consumers should not wait a full period for the first state.
            let _ = state_tx.try_send(evaluate(deadline, Timestamp::now()));

            loop {
                select! {
                    recv(ticker) -> _ => {
                        let _ = state_tx.try_send(evaluate(deadline, Timestamp::now()));
                    }
                    recv(control_rx) -> msg => {
                        match msg {
                            Ok(Control::SetDeadline(next)) => {
                                deadline = next;
                                let _ = state_tx.try_send(evaluate(deadline, Timestamp::now()));
                            }
                            Ok(Control::Stop) | Err(_) => break,
                        }
                    }
                }
            }
        });

        Self {
            control: control_tx,
            states: state_rx,
            worker: Some(worker),
        }
    }

    /// Channel of countdown states, one per tick or deadline change.
    /// Slow consumers miss ticks rather than stalling the clock.
    pub fn states(&self) -> &Receiver<Option<CountdownState>> {
        &self.states
    }

    /// Replace the deadline and re-evaluate immediately.
    pub fn set_deadline(&self, deadline: Option<Timestamp>) {
        let _ = self.control.send(Control::SetDeadline(deadline));
    }

    /// Stop the ticker. Idempotent; no state remains queued or is
    /// emitted after this returns.
    pub fn cancel(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.control.send(Control::Stop);
            let _ = worker.join();
            while self.states.try_recv().is_ok() {}
        }
    }
}

impl Drop for CountdownTicker {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const NOW: Timestamp = Timestamp(1_700_000_000_000);

    #[test]
    fn test_no_deadline_no_countdown() {
        assert_eq!(evaluate(None, NOW), None);
    }

    #[test]
    fn test_deadline_at_now_is_closed() {
        let state = evaluate(Some(NOW), NOW).unwrap();
        assert_eq!(state.display, "Closed");
        assert!(!state.is_active);
        assert_eq!(state.time_remaining, Duration::ZERO);
    }

    #[test]
    fn test_past_deadline_is_closed() {
        let state = evaluate(Some(NOW.offset(-5 * MINUTE_MS)), NOW).unwrap();
        assert_eq!(state.display, "Closed");
        assert!(!state.is_active);
        assert_eq!(state.time_remaining, Duration::ZERO);
    }

    #[test]
    fn test_sixty_one_minutes_out() {
        let state = evaluate(Some(NOW.offset(61 * MINUTE_MS)), NOW).unwrap();
        assert_eq!(state.display, "1h 1m left");
        assert!(state.is_active);
        assert_eq!(state.time_remaining, Duration::from_millis(61 * 60 * 1000));
    }

    #[test]
    fn test_ninety_seconds_out() {
        let state = evaluate(Some(NOW.offset(90 * 1000)), NOW).unwrap();
        assert_eq!(state.display, "1m left");
    }

    #[test]
    fn test_under_a_minute_shows_zero_minutes() {
        let state = evaluate(Some(NOW.offset(30 * 1000)), NOW).unwrap();
        assert_eq!(state.display, "0m left");
        assert!(state.is_active);
    }

    #[test]
    fn test_multi_day_display() {
        let state = evaluate(Some(NOW.offset(2 * DAY_MS + 5 * HOUR_MS)), NOW).unwrap();
        assert_eq!(state.display, "2d 5h left");
    }

    #[test]
    fn test_ticker_emits_immediately_and_on_deadline_change() {
        let mut ticker = CountdownTicker::start(Some(Timestamp::now().offset(-1000)));

        let first = ticker
            .states()
            .recv_timeout(Duration::from_millis(500))
            .unwrap()
            .unwrap();
        assert_eq!(first.display, "Closed");

        ticker.set_deadline(Some(Timestamp::now().offset(2 * HOUR_MS)));
        let second = ticker
            .states()
            .recv_timeout(Duration::from_millis(500))
            .unwrap()
            .unwrap();
        assert!(second.is_active);

        ticker.cancel();
    }

    #[test]
    fn test_ticker_ticks_periodically() {
        let mut ticker = CountdownTicker::start(None);

        let first = ticker
            .states()
            .recv_timeout(Duration::from_millis(500))
            .unwrap();
        assert!(first.is_none());

        let second = ticker
            .states()
            .recv_timeout(Duration::from_millis(1500))
            .unwrap();
        assert!(second.is_none());

        ticker.cancel();
    }

    #[test]
    fn test_cancel_is_idempotent_and_final() {
        let mut ticker = CountdownTicker::start(Some(Timestamp::now().offset(HOUR_MS)));
        ticker.cancel();
        ticker.cancel();
        assert!(ticker.states().try_recv().is_err());
    }

    proptest! {
        #[test]
        fn future_deadlines_are_active(diff in 1i64..30 * DAY_MS) {
            let state = evaluate(Some(NOW.offset(diff)), NOW).unwrap();
            prop_assert!(state.is_active);
            prop_assert!(state.display.ends_with(" left"));
            prop_assert_eq!(state.time_remaining, Duration::from_millis(diff as u64));
        }

        #[test]
        fn past_deadlines_are_closed(diff in -30 * DAY_MS..=0i64) {
            let state = evaluate(Some(NOW.offset(diff)), NOW).unwrap();
            prop_assert!(!state.is_active);
            prop_assert_eq!(&state.display, "Closed");
            prop_assert_eq!(state.time_remaining, Duration::ZERO);
        }
    }
}
