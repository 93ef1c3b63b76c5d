//! Run-period reconciliation between the atmosphere and coupler namelists.
//!
//! Both sub-models carry their own copy of the chunk start and length. The
//! reconciler checks that they agree, derives the authoritative chunk
//! `[start, end)` and writes the chunk back into both encodings.

use std::fs;
use std::path::Path;

use cc_core::{RunLength, add_run_length, coupler_date, format_day_stamp, parse_atmosphere_date};
use cc_namelist::{NamelistStore, Value};
use chrono::{NaiveDateTime, TimeDelta};
use tracing::{debug, info};

use crate::error::{CaseError, CaseResult};
use crate::names::*;

/// One execution chunk `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPeriod {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl RunPeriod {
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn seconds(&self) -> i64 {
        self.duration().num_seconds()
    }

    /// Whole hours in the chunk, rounded down.
    pub fn hours(&self) -> i64 {
        self.seconds().div_euclid(3600)
    }

    /// `{name}_{start:YYYYMMDD}-{end:YYYYMMDD}.out`
    pub fn log_file_name(&self, case_name: &str) -> String {
        format!(
            "{}_{}-{}.out",
            case_name,
            format_day_stamp(&self.start),
            format_day_stamp(&self.end)
        )
    }
}

/// Outcome of reconciliation: the chunk to run and the case end it is
/// bounded by (derived from the chunk itself for open-ended cases).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSchedule {
    pub period: RunPeriod,
    pub case_end: NaiveDateTime,
}

fn hours_delta(what: &str, hours: f64) -> CaseResult<TimeDelta> {
    let seconds = (hours * 3600.0).round();
    // `as` saturates, so anything beyond the i64 range fails in `try_seconds`.
    (seconds.is_finite() && seconds.abs() < i64::MAX as f64)
        .then(|| TimeDelta::try_seconds(seconds as i64))
        .flatten()
        .ok_or_else(|| out_of_range(what, format!("{} hours", hours)))
}

fn shift(what: &str, date: NaiveDateTime, delta: TimeDelta) -> CaseResult<NaiveDateTime> {
    date.checked_add_signed(delta)
        .ok_or_else(|| out_of_range(what, format!("{} + {}", date, delta)))
}

fn out_of_range(what: &str, value: String) -> CaseError {
    CaseError::InvalidValue {
        what: what.to_string(),
        reason: format!("{} is outside the supported date range", value),
    }
}

/// Chunk start as encoded by the atmosphere: `ydate_ini + hstart`.
pub fn atmosphere_start(store: &mut NamelistStore) -> CaseResult<NaiveDateTime> {
    let org = store.get(INPUT_ORG)?;
    let ydate_ini = parse_atmosphere_date(org.string(RUNCTL, "ydate_ini")?)?;
    let hstart = org.float(RUNCTL, "hstart")?;
    let what = format!("{}/{}/hstart", INPUT_ORG, RUNCTL);
    shift(&what, ydate_ini, hours_delta(&what, hstart)?)
}

/// Chunk start as encoded by the coupler: `start_ymd` plus `start_tod`
/// seconds (0 when absent).
pub fn coupler_start(store: &mut NamelistStore) -> CaseResult<NaiveDateTime> {
    let drv = store.get(DRV_IN)?;
    let ymd = drv.int(TIMEMGR, "start_ymd")?;
    let tod = match drv.require_group(TIMEMGR)?.get("start_tod") {
        Some(_) => drv.int(TIMEMGR, "start_tod")?,
        None => 0,
    };
    Ok(coupler_date(ymd, tod)?)
}

/// Chunk length in seconds as encoded by each side, for open-ended cases.
fn encoded_durations(store: &mut NamelistStore) -> CaseResult<(f64, i64)> {
    let org = store.get(INPUT_ORG)?;
    let nstop = org.int(RUNCTL, "nstop")?;
    let dt = org.float(RUNCTL, "dt")?;
    let hstart = org.float(RUNCTL, "hstart")?;
    let atmosphere_s = (nstop as f64 + 1.0) * dt - hstart * 3600.0;
    let coupler_s = store.get(DRV_IN)?.int(TIMEMGR, "stop_n")?;
    Ok((atmosphere_s, coupler_s))
}

/// Derive the authoritative chunk for the case.
pub fn compute_run_period(
    store: &mut NamelistStore,
    case_end: Option<NaiveDateTime>,
    run_length: Option<&RunLength>,
) -> CaseResult<RunSchedule> {
    let atmosphere = atmosphere_start(store)?;
    let coupler = coupler_start(store)?;
    if atmosphere != coupler {
        return Err(CaseError::DateMismatch {
            atmosphere,
            coupler,
        });
    }
    let start = atmosphere;

    let schedule = match case_end {
        Some(case_end) => {
            if start > case_end {
                return Err(CaseError::InvalidRange {
                    start,
                    end: case_end,
                });
            }
            let end = if start == case_end {
                // Trailing one-day chunk; only there to flush last-step output.
                shift("dummy chunk end", start, TimeDelta::days(1))?
            } else {
                match run_length {
                    Some(length) => add_run_length(&start, length)?.min(case_end),
                    None => case_end,
                }
            };
            RunSchedule {
                period: RunPeriod { start, end },
                case_end,
            }
        }
        None => {
            let end = match run_length {
                Some(length) => add_run_length(&start, length)?,
                None => {
                    let (atmosphere_s, coupler_s) = encoded_durations(store)?;
                    if (atmosphere_s - coupler_s as f64).abs() > 1e-6 {
                        return Err(CaseError::DurationMismatch {
                            atmosphere_s,
                            coupler_s,
                        });
                    }
                    let what = format!("{}/{}/stop_n", DRV_IN, TIMEMGR);
                    let delta = TimeDelta::try_seconds(coupler_s)
                        .ok_or_else(|| out_of_range(&what, format!("{} seconds", coupler_s)))?;
                    shift(&what, start, delta)?
                }
            };
            RunSchedule {
                period: RunPeriod { start, end },
                case_end: end,
            }
        }
    };

    if schedule.period.end <= schedule.period.start {
        return Err(CaseError::InvalidRange {
            start: schedule.period.start,
            end: schedule.period.end,
        });
    }

    info!(
        start = %schedule.period.start,
        end = %schedule.period.end,
        case_end = %schedule.case_end,
        "computed run period"
    );
    Ok(schedule)
}

/// Write the chunk into both sub-models' namelists and the coupling
/// template.
pub fn apply_run_period(
    store: &mut NamelistStore,
    case_dir: &Path,
    case_start: NaiveDateTime,
    period: &RunPeriod,
) -> CaseResult<()> {
    let hstart = (period.start - case_start).num_seconds().div_euclid(3600);
    let hstop = hstart + period.hours();
    let seconds = period.seconds();

    let org = store.get(INPUT_ORG)?;
    let dt = org.float(RUNCTL, "dt")?;
    if dt <= 0.0 {
        return Err(CaseError::InvalidValue {
            what: format!("{}/{}/dt", INPUT_ORG, RUNCTL),
            reason: format!("time step must be positive, got {}", dt),
        });
    }
    let nstop = (hstop as f64 * 3600.0 / dt).floor() as i64 - 1;
    org.set(RUNCTL, "nstop", nstop)?;

    let io = store.get(INPUT_IO)?;
    for gribout in io.groups_mut(GRIBOUT) {
        let Some(hcomb) = gribout.get_mut("hcomb") else {
            return Err(CaseError::MissingField {
                file: INPUT_IO.to_string(),
                block: GRIBOUT.to_string(),
                param: Some("hcomb".to_string()),
            });
        };
        let mut window = hcomb.as_slice().to_vec();
        window.resize(window.len().max(2), Value::Float(0.0));
        window[0] = Value::Float(hstart as f64);
        window[1] = Value::Float(hstop as f64);
        *hcomb = Value::List(window);
    }
    io.set(IOCTL, "nhour_restart", vec![hstop, hstop, 24])?;

    let drv = store.get(DRV_IN)?;
    drv.set(TIMEMGR, "stop_n", seconds)?;
    drv.set(TIMEMGR, "restart_n", seconds)?;

    let template = case_dir.join(NAMCOUPLE_TEMPLATE);
    if template.is_file() {
        let content = fs::read_to_string(&template).map_err(CaseError::io(&template))?;
        let target = case_dir.join(NAMCOUPLE);
        fs::write(&target, content.replace(RUNTIME_TOKEN, &seconds.to_string()))
            .map_err(CaseError::io(&target))?;
        debug!(path = %target.display(), seconds, "wrote coupling configuration");
    }

    debug!(hstart, hstop, nstop, seconds, "applied run period");
    Ok(())
}
