//! Output-window filtering for the atmosphere `gribout` groups.
//!
//! A gribout group whose threshold (`hcomb[2]`, hours) exceeds the chunk
//! length makes the atmosphere model fail on short chunks. Such groups are
//! dropped from the persisted namelist. When none survive the groups are
//! removed outright: the model treats a missing gribout differently from
//! `ngribout = 0`, and only the former is safe.

use cc_namelist::{Group, Namelist};
use tracing::info;

use crate::error::{CaseError, CaseResult};
use crate::names::{GRIBOUT, INPUT_IO, IOCTL};

/// What [`apply_output_window`] did to the namelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputWindow {
    /// Some groups survived; the count is also written to `ngribout`.
    Retained(usize),
    /// Every group was below the chunk length and has been removed.
    Removed,
    /// The namelist has no gribout group.
    Absent,
}

/// Activation threshold of a gribout group, in hours.
pub fn threshold_hours(group: &Group) -> CaseResult<f64> {
    let hcomb = group.get("hcomb").ok_or_else(|| CaseError::MissingField {
        file: INPUT_IO.to_string(),
        block: GRIBOUT.to_string(),
        param: Some("hcomb".to_string()),
    })?;
    hcomb
        .as_slice()
        .get(2)
        .and_then(|v| v.as_float())
        .ok_or_else(|| CaseError::InvalidValue {
            what: format!("{}/{}/hcomb", INPUT_IO, GRIBOUT),
            reason: "expected [start, stop, increment] hours".to_string(),
        })
}

/// Keep the groups whose threshold fits in `chunk_hours`.
pub fn filter_output_blocks(blocks: Vec<Group>, chunk_hours: i64) -> CaseResult<Vec<Group>> {
    let mut retained = Vec::with_capacity(blocks.len());
    for block in blocks {
        if chunk_hours as f64 >= threshold_hours(&block)? {
            retained.push(block);
        }
    }
    Ok(retained)
}

/// Filter the gribout groups of `namelist` in place.
pub fn apply_output_window(namelist: &mut Namelist, chunk_hours: i64) -> CaseResult<OutputWindow> {
    let blocks: Vec<Group> = namelist.groups(GRIBOUT).cloned().collect();
    if blocks.is_empty() {
        return Ok(OutputWindow::Absent);
    }

    let total = blocks.len();
    let retained = filter_output_blocks(blocks, chunk_hours)?;
    if retained.is_empty() {
        namelist.remove_groups(GRIBOUT);
        info!(removed = total, chunk_hours, "removed all gribout blocks");
        return Ok(OutputWindow::Removed);
    }

    let kept = retained.len();
    namelist.set_groups(GRIBOUT, retained);
    namelist.set(IOCTL, "ngribout", kept as i64)?;
    if kept < total {
        info!(kept, dropped = total - kept, chunk_hours, "filtered gribout blocks");
    }
    Ok(OutputWindow::Retained(kept))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_namelist::Value;
    use proptest::prelude::*;

    fn gribout(threshold: f64, dir: &str) -> Group {
        Group::new(GRIBOUT)
            .with("hcomb", vec![0.0, 8760.0, threshold])
            .with("ydir", dir)
    }

    fn input_io(thresholds: &[f64]) -> Namelist {
        let mut nml = Namelist::new(INPUT_IO).with_group(Group::new(IOCTL).with("ngribout", thresholds.len() as i64));
        for (i, t) in thresholds.iter().enumerate() {
            nml.push_group(gribout(*t, &format!("out{}", i)));
        }
        nml
    }

    #[test]
    fn block_kept_for_long_chunk_and_removed_for_short() {
        let mut long = input_io(&[48.0]);
        assert_eq!(apply_output_window(&mut long, 72).unwrap(), OutputWindow::Retained(1));
        assert_eq!(long.group_count(GRIBOUT), 1);

        let mut short = input_io(&[48.0]);
        assert_eq!(apply_output_window(&mut short, 24).unwrap(), OutputWindow::Removed);
        assert_eq!(short.group_count(GRIBOUT), 0);
        // The count is left alone: absence, not zero, is what the model needs.
        assert_eq!(short.int(IOCTL, "ngribout").unwrap(), 1);
    }

    #[test]
    fn partial_retention_updates_count() {
        let mut nml = input_io(&[1.0, 48.0, 24.0]);
        assert_eq!(apply_output_window(&mut nml, 24).unwrap(), OutputWindow::Retained(2));
        assert_eq!(nml.int(IOCTL, "ngribout").unwrap(), 2);
        let dirs: Vec<&Value> = nml.groups(GRIBOUT).map(|g| g.get("ydir").unwrap()).collect();
        assert_eq!(dirs, [&Value::from("out0"), &Value::from("out2")]);
    }

    #[test]
    fn threshold_equal_to_chunk_is_kept() {
        let kept = filter_output_blocks(vec![gribout(24.0, "a")], 24).unwrap();
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn absent_gribout_is_noop() {
        let mut nml = Namelist::new(INPUT_IO).with_group(Group::new(IOCTL));
        assert_eq!(apply_output_window(&mut nml, 24).unwrap(), OutputWindow::Absent);
        assert!(nml.group(IOCTL).unwrap().is_empty());
    }

    #[test]
    fn missing_hcomb_is_reported() {
        let mut nml = Namelist::new(INPUT_IO)
            .with_group(Group::new(IOCTL))
            .with_group(Group::new(GRIBOUT).with("ydir", "x"));
        assert!(matches!(
            apply_output_window(&mut nml, 24),
            Err(CaseError::MissingField { .. })
        ));
    }

    proptest! {
        #[test]
        fn filtering_is_idempotent(
            thresholds in prop::collection::vec(prop_oneof![Just(1.0), Just(6.0), Just(24.0), Just(48.0), Just(720.0)], 0..6),
            hours in 0i64..1000,
        ) {
            let mut once = input_io(&thresholds);
            apply_output_window(&mut once, hours).unwrap();
            let mut twice = once.clone();
            apply_output_window(&mut twice, hours).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
