//! File, block and parameter names shared by the sub-model namelists.

/// Atmosphere run control namelist.
pub const INPUT_ORG: &str = "INPUT_ORG";
/// Atmosphere I/O namelist.
pub const INPUT_IO: &str = "INPUT_IO";
/// Coupler driver namelist.
pub const DRV_IN: &str = "drv_in";

pub const RUNCTL: &str = "runctl";
pub const IOCTL: &str = "ioctl";
pub const GRIBIN: &str = "gribin";
pub const GRIBOUT: &str = "gribout";

pub const TIMEMGR: &str = "seq_timemgr_inparm";
pub const INFODATA: &str = "seq_infodata_inparm";
pub const CCSM_PES: &str = "ccsm_pes";
pub const MODELIO: &str = "modelio";

/// Components of the coupler; their task counts are kept equal.
pub const COUPLED_COMPONENTS: [&str; 8] = ["atm", "cpl", "glc", "ice", "lnd", "ocn", "rof", "wav"];

pub const NAMCOUPLE_TEMPLATE: &str = "namcouple_tmpl";
pub const NAMCOUPLE: &str = "namcouple";
pub const RUNTIME_TOKEN: &str = "_runtime_";

pub const RANK_MAP: &str = "proc_config";
pub const CONTROL_SCRIPT: &str = "controller";
pub const DESCRIPTOR: &str = "config.yaml";

pub fn modelio_file(component: &str) -> String {
    format!("{}_modelio.nml", component)
}
