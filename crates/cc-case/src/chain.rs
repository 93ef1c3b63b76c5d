//! Restart chain: the states a case moves through between chunks and the
//! namelist edits that turn a finished chunk into a restart.

use std::fmt;

use cc_core::coupler_fields;
use cc_namelist::{NamelistStore, Value};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

use crate::error::CaseResult;
use crate::names::*;
use crate::reconcile::RunPeriod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainState {
    /// First chunk, starting at the case start.
    Initial,
    /// A restarted chunk inside the case.
    Continuing,
    /// One-day chunk starting at the case end.
    FinalDummy,
    /// No chunk left.
    Done,
}

impl ChainState {
    /// State of a case whose current chunk is `period`.
    pub fn derive(case_start: NaiveDateTime, case_end: NaiveDateTime, period: &RunPeriod) -> Self {
        if period.start == case_start {
            ChainState::Initial
        } else if period.start == case_end {
            ChainState::FinalDummy
        } else {
            ChainState::Continuing
        }
    }
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChainState::Initial => "initial",
            ChainState::Continuing => "continuing",
            ChainState::FinalDummy => "final-dummy",
            ChainState::Done => "done",
        })
    }
}

/// Result of one advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Continue(RunPeriod),
    Terminal,
}

/// Whether another chunk follows `period`.
///
/// A chunk ending exactly at the case end is followed by the dummy chunk
/// when `dummy_day` is set, unless it is the dummy chunk itself.
pub fn has_next_chunk(period: &RunPeriod, case_end: NaiveDateTime, dummy_day: bool, state: ChainState) -> bool {
    if state == ChainState::Done {
        return false;
    }
    period.end < case_end || (period.end == case_end && dummy_day && state != ChainState::FinalDummy)
}

/// Rewrite the start of both sub-models to `previous_end` and switch them
/// to restart mode. Nothing is flushed.
pub fn prepare_continuation(
    store: &mut NamelistStore,
    case_start: NaiveDateTime,
    previous_end: NaiveDateTime,
) -> CaseResult<()> {
    let hstart = (previous_end - case_start).num_seconds() as f64 / 3600.0;
    store.get(INPUT_ORG)?.set(RUNCTL, "hstart", hstart)?;

    let io = store.get(INPUT_IO)?;
    let restart_dir = io.value(IOCTL, "ydir_restart_out")?.clone();
    io.set(GRIBIN, "ydirini", restart_dir)?;
    for gribout in io.groups_mut(GRIBOUT) {
        gribout.set("lwrite_const", false);
    }

    let (ymd, tod) = coupler_fields(&previous_end);
    let drv = store.get(DRV_IN)?;
    drv.set(TIMEMGR, "start_ymd", ymd)?;
    drv.set(TIMEMGR, "start_tod", tod)?;
    drv.set(INFODATA, "start_type", Value::from("continue"))?;

    debug!(hstart, start_ymd = ymd, start_tod = tod, "prepared restart");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn period(a: u32, b: u32) -> RunPeriod {
        RunPeriod {
            start: day(a),
            end: day(b),
        }
    }

    #[test]
    fn state_is_derived_from_chunk_start() {
        assert_eq!(ChainState::derive(day(1), day(3), &period(1, 2)), ChainState::Initial);
        assert_eq!(ChainState::derive(day(1), day(3), &period(2, 3)), ChainState::Continuing);
        assert_eq!(ChainState::derive(day(1), day(3), &period(3, 4)), ChainState::FinalDummy);
    }

    #[test]
    fn next_chunk_rules() {
        let end = day(3);
        assert!(has_next_chunk(&period(1, 2), end, false, ChainState::Initial));
        assert!(!has_next_chunk(&period(2, 3), end, false, ChainState::Continuing));
        assert!(has_next_chunk(&period(2, 3), end, true, ChainState::Continuing));
        assert!(!has_next_chunk(&period(3, 4), end, true, ChainState::FinalDummy));
        assert!(!has_next_chunk(&period(1, 2), end, true, ChainState::Done));
    }
}
