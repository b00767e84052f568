// 🔄 Weekly Reset Controller
//
// At startup, compare the current period with the one recorded last time.
// When it moved, clear every record's weekly progress. Ordering matters:
// the roster is saved before the new period is recorded, so a failed save
// leaves the old period in place and the reset runs again next start.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::character::Roster;
use crate::db::{self, LAST_WEEK_ID_KEY};
use crate::error::Result;
use crate::notification::Notification;
use crate::temporal::PeriodId;

#[derive(Debug, Clone, PartialEq)]
pub enum ResetState {
    /// Nothing recorded yet (first run).
    NoRecordedPeriod,
    WeekCurrent,
    WeekStale { previous: String },
}

impl ResetState {
    pub fn classify(recorded: Option<&str>, current: &PeriodId) -> Self {
        match recorded {
            None => ResetState::NoRecordedPeriod,
            Some(previous) if current.matches(previous) => ResetState::WeekCurrent,
            Some(previous) => ResetState::WeekStale {
                previous: previous.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResetOutcome {
    /// First run: the current period was recorded, nothing cleared.
    FirstRun { current: PeriodId },
    Unchanged { current: PeriodId },
    Reset {
        previous: String,
        current: PeriodId,
        /// Records that had weekly progress to clear.
        cleared: usize,
    },
    /// This controller already ran.
    AlreadyEvaluated,
}

impl ResetOutcome {
    pub fn did_reset(&self) -> bool {
        matches!(self, ResetOutcome::Reset { .. })
    }
}

/// Runs the reset check at most once per instance.
#[derive(Debug, Default)]
pub struct WeeklyResetController {
    evaluated: bool,
}

impl WeeklyResetController {
    pub fn new() -> Self {
        WeeklyResetController::default()
    }

    pub fn has_run(&self) -> bool {
        self.evaluated
    }

    pub fn run_once(
        &mut self,
        conn: &Connection,
        roster: &mut Roster,
        now: DateTime<Utc>,
    ) -> Result<ResetOutcome> {
        if self.evaluated {
            return Ok(ResetOutcome::AlreadyEvaluated);
        }
        self.evaluated = true;

        let current = PeriodId::for_timestamp(now);
        let recorded = db::get_setting(conn, LAST_WEEK_ID_KEY)?;
        tracing::debug!(current = %current, recorded = ?recorded, "weekly reset check");

        match ResetState::classify(recorded.as_deref(), &current) {
            ResetState::NoRecordedPeriod => {
                db::set_setting(conn, LAST_WEEK_ID_KEY, current.as_str())?;
                Ok(ResetOutcome::FirstRun { current })
            }
            ResetState::WeekCurrent => Ok(ResetOutcome::Unchanged { current }),
            ResetState::WeekStale { previous } => {
                let cleared = roster.reset_weekly_all();

                db::save_roster(conn, roster)?;
                db::set_setting(conn, LAST_WEEK_ID_KEY, current.as_str())?;

                let message = format!(
                    "Weekly reset: cleared progress for {} characters (week {}).",
                    cleared, current
                );
                db::insert_notification(conn, &Notification::info(message))?;

                tracing::info!(previous = %previous, current = %current, cleared, "weekly reset applied");
                Ok(ResetOutcome::Reset {
                    previous,
                    current,
                    cleared,
                })
            }
        }
    }
}

/// Clear weekly progress on demand and save. The recorded period is left
/// alone, so the automatic check still fires at the next reset.
pub fn reset_now(conn: &Connection, roster: &mut Roster) -> Result<usize> {
    let cleared = roster.reset_weekly_all();
    db::save_roster(conn, roster)?;

    let message = format!("Weekly progress reset manually for {} characters.", cleared);
    db::insert_notification(conn, &Notification::info(message))?;

    tracing::info!(cleared, "manual weekly reset");
    Ok(cleared)
}

/// Period last recorded by the controller, if any.
pub fn recorded_period(conn: &Connection) -> Result<Option<PeriodId>> {
    Ok(db::get_setting(conn, LAST_WEEK_ID_KEY)?.map(PeriodId::from_stored))
}
