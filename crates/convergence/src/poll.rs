use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

/// One predicate evaluation's classification of the observed service state.
///
/// The predicate, not the poller, decides what each observation means: a
/// transient disagreement is `NotYet`, while an unknowable condition is an
/// `Err` from the predicate itself and aborts the wait immediately.
#[derive(Debug)]
pub enum PollOutcome<T> {
    /// The condition has not been met; carries a rendered last-observed value
    /// for the timeout diagnostic.
    NotYet(Option<String>),
    /// The condition has been met.
    Reached(T),
}

/// Invokes `predicate` up to `max_attempts` times, sleeping `interval`
/// between attempts (never after the final one).
///
/// Returns the reached value as soon as the predicate yields
/// [`PollOutcome::Reached`]. A predicate `Err` propagates immediately without
/// further attempts.
///
/// # Errors
///
/// [`Error::ConvergenceTimeout`] when every attempt yields
/// [`PollOutcome::NotYet`], carrying the last observed value; any error the
/// predicate returns, unmodified.
pub fn await_condition<T, F>(mut predicate: F, max_attempts: u32, interval: Duration) -> Result<T>
where
    F: FnMut() -> Result<PollOutcome<T>>,
{
    let mut last_observed = None;
    for attempt in 1..=max_attempts {
        match predicate()? {
            PollOutcome::Reached(value) => return Ok(value),
            PollOutcome::NotYet(observed) => {
                if observed.is_some() {
                    last_observed = observed;
                }
            }
        }
        if attempt < max_attempts {
            thread::sleep(interval);
        }
    }
    Err(Error::ConvergenceTimeout {
        attempts: max_attempts,
        interval,
        last_observed: last_observed.unwrap_or_else(|| "nothing".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaches_on_first_success() {
        let mut calls = 0;
        let result = await_condition(
            || {
                calls += 1;
                Ok(PollOutcome::Reached(42))
            },
            5,
            Duration::ZERO,
        );
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 1);
    }

    #[test]
    fn retries_until_reached() {
        let mut calls = 0;
        let result = await_condition(
            || {
                calls += 1;
                if calls < 3 {
                    Ok(PollOutcome::NotYet(Some(format!("attempt {calls}"))))
                } else {
                    Ok(PollOutcome::Reached("done"))
                }
            },
            5,
            Duration::ZERO,
        );
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls, 3);
    }

    #[test]
    fn timeout_carries_last_observed() {
        let mut calls = 0;
        let result: Result<()> = await_condition(
            || {
                calls += 1;
                Ok(PollOutcome::NotYet(Some(format!("value {calls}"))))
            },
            4,
            Duration::ZERO,
        );
        match result {
            Err(Error::ConvergenceTimeout {
                attempts,
                last_observed,
                ..
            }) => {
                assert_eq!(attempts, 4);
                assert_eq!(last_observed, "value 4");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(calls, 4);
    }

    #[test]
    fn timeout_without_observation_says_nothing() {
        let result: Result<()> =
            await_condition(|| Ok(PollOutcome::NotYet(None)), 2, Duration::ZERO);
        match result {
            Err(Error::ConvergenceTimeout { last_observed, .. }) => {
                assert_eq!(last_observed, "nothing");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn fatal_error_aborts_immediately() {
        let mut calls = 0;
        let result: Result<()> = await_condition(
            || {
                calls += 1;
                Err(Error::Fatal("malformed response".into()))
            },
            10,
            Duration::ZERO,
        );
        assert!(matches!(result, Err(Error::Fatal(_))));
        assert_eq!(calls, 1);
    }
}
