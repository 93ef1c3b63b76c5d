#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use cc_case::{CaseParams, DecompositionOverrides, ModulesOpt};
use cc_core::parse_case_date;
use tempfile::TempDir;

pub const INPUT_ORG: &str = r#"
 &runctl
  ydate_ini = '2020010100',
  hstart = 0.0,
  nstop = 1439,
  dt = 60.0,
  nprocx = 4,
  nprocy = 3,
  lreproduce = .TRUE.,
 /
"#;

pub const DRV_IN: &str = r#"
 &seq_infodata_inparm
  case_name = 'template',
  start_type = 'startup',
  timing_dir = './timing',
  tchkpt_dir = './timing/checkpoints',
 /
 &seq_timemgr_inparm
  calendar = 'GREGORIAN',
  start_ymd = 20200101,
  stop_option = 'nseconds',
  stop_n = 86400,
  restart_option = 'nseconds',
  restart_n = 86400,
 /
 &ccsm_pes
  atm_ntasks = 12, cpl_ntasks = 12, glc_ntasks = 12, ice_ntasks = 12,
  lnd_ntasks = 12, ocn_ntasks = 12, rof_ntasks = 12, wav_ntasks = 12,
 /
"#;

pub const NAMCOUPLE_TMPL: &str = " $RUNTIME\n _runtime_\n $END\n";

/// INPUT_IO with one gribout group per threshold (hours).
pub fn input_io(thresholds: &[f64]) -> String {
    let mut text = format!(
        " &ioctl\n  ngribout = {},\n  nhour_restart = 0, 24, 24,\n  \
         ydir_restart_in = './COSMO_RESTART/',\n  ydir_restart_out = './COSMO_RESTART/',\n /\n \
         &gribin\n  ydirini = './COSMO_input/',\n  ydirbd = './COSMO_input/',\n /\n",
        thresholds.len()
    );
    for (i, threshold) in thresholds.iter().enumerate() {
        let _ = write!(
            text,
            " &gribout\n  hcomb = 0.0, 8760.0, {:?},\n  ydir = './COSMO_output/out{}/',\n  lwrite_const = .TRUE.,\n /\n",
            threshold, i
        );
    }
    text
}

/// A case directory holding every file a case needs.
pub fn case_dir(thresholds: &[f64]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_case_files(dir.path(), thresholds);
    dir
}

pub fn write_case_files(path: &Path, thresholds: &[f64]) {
    fs::write(path.join("INPUT_ORG"), INPUT_ORG).unwrap();
    fs::write(path.join("INPUT_IO"), input_io(thresholds)).unwrap();
    fs::write(path.join("drv_in"), DRV_IN).unwrap();
    fs::write(path.join("namcouple_tmpl"), NAMCOUPLE_TMPL).unwrap();
    for comp in ["atm", "cpl", "glc", "ice", "lnd", "ocn", "rof", "wav"] {
        fs::write(
            path.join(format!("{}_modelio.nml", comp)),
            format!(
                " &modelio\n  diri = './CESM_input/',\n  diro = './CESM_output/',\n  logfile = '{}.log',\n /\n",
                comp
            ),
        )
        .unwrap();
    }
}

pub fn params(path: &Path, end: Option<&str>, run_length: Option<&str>, dummy_day: bool) -> CaseParams {
    CaseParams {
        name: "test".to_string(),
        path: path.to_path_buf(),
        start_date: Some(parse_case_date("2020-01-01-00").unwrap()),
        end_date: end.map(|e| parse_case_date(e).unwrap()),
        run_length: run_length.map(|r| r.parse().unwrap()),
        atmosphere_exe: "cosmo".to_string(),
        coupler_exe: "cesm.exe".to_string(),
        wall_time: "01:00:00".to_string(),
        account: Some("s123".to_string()),
        gpu_mode: false,
        modules: ModulesOpt::Switch,
        dummy_day,
        tasks_per_node: 12,
        overrides: DecompositionOverrides::default(),
        gen_oasis: false,
    }
}
