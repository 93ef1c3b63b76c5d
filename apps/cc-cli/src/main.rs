use std::fs;
use std::path::{Path, PathBuf};

use cc_case::{
    BatchScheduler, Case, CaseError, CaseOptions, CaseResult, FileSync, ModulesOpt, Rsync, SetupFile,
    SlurmScheduler, SrunLauncher, Transition, load_setup_file,
};
use cc_core::format_case_date;
use clap::{Args, Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "cc2")]
#[command(about = "COSMO-CLM2 case tool - set up and chain coupled model runs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up a new case and submit its first chunk
    Create(CreateArgs),
    /// Run the current chunk, advance, and submit the next one (batch entry point)
    Control {
        /// Path to the case descriptor
        descriptor: PathBuf,
    },
    /// Advance to the next chunk without running
    Advance {
        /// Path to the case descriptor
        descriptor: PathBuf,
        /// Submit the next chunk if there is one
        #[arg(long)]
        submit: bool,
    },
    /// Show the current chunk, chain state and process layout
    Show {
        /// Path to the case descriptor
        descriptor: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct CreateArgs {
    /// YAML file with `main` options and namelist changes
    #[arg(short, long, value_name = "FILE")]
    setup_file: Option<PathBuf>,
    /// Case name (default: COSMO_CLM2)
    #[arg(long)]
    name: Option<String>,
    /// Case directory (default: $SCRATCH/<name>)
    #[arg(long)]
    path: Option<PathBuf>,
    /// Simulation start, YYYY-MM-DD-HH (default: INPUT_ORG ydate_ini)
    #[arg(long, value_name = "DATE")]
    start_date: Option<String>,
    /// Simulation end, YYYY-MM-DD-HH (default: INPUT_ORG ydate_end)
    #[arg(long, value_name = "DATE")]
    end_date: Option<String>,
    /// Restart interval: NyMm or Nd, N possibly signed
    #[arg(long, value_name = "NyMm|Nd")]
    run_length: Option<String>,
    /// Atmosphere executable (default: cosmo)
    #[arg(long)]
    atmosphere_exe: Option<String>,
    /// Coupler executable (default: cesm.exe)
    #[arg(long)]
    coupler_exe: Option<String>,
    /// Reserved time on compute nodes (default: 24:00:00)
    #[arg(long)]
    wall_time: Option<String>,
    /// Batch account (default: inferred from $PROJECT)
    #[arg(long)]
    account: Option<String>,
    /// Run the atmosphere on gpu (default: false)
    #[arg(long)]
    gpu_mode: Option<bool>,
    /// Run a dummy day after the end to get the last output (default: true)
    #[arg(long)]
    dummy_day: Option<bool>,
    /// Purge modules before loading (default: false)
    #[arg(long)]
    module_purge: Option<bool>,
    /// Module setup: switch, purge or none (overrides --module-purge)
    #[arg(long)]
    modules_opt: Option<ModulesOpt>,
    /// Tasks per compute node (default: 12)
    #[arg(long)]
    tasks_per_node: Option<u32>,
    /// Atmosphere subdomains along x (default: from INPUT_ORG)
    #[arg(long)]
    nprocx: Option<u32>,
    /// Atmosphere subdomains along y (default: from INPUT_ORG)
    #[arg(long)]
    nprocy: Option<u32>,
    /// Tasks for each coupled component (default: from drv_in)
    #[arg(long)]
    coupler_tasks: Option<u32>,
    /// Generate the coupler's auxiliary files; forces --dummy-day false
    #[arg(long)]
    gen_oasis: bool,
    /// Directory whose contents are synced into the case first (repeatable)
    #[arg(long, value_name = "DIR")]
    sync_from: Vec<PathBuf>,
    /// Do not submit the case after setup
    #[arg(long)]
    no_submit: bool,
}

impl CreateArgs {
    fn options(&self) -> CaseOptions {
        CaseOptions {
            name: self.name.clone(),
            path: self.path.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            run_length: self.run_length.clone(),
            atmosphere_exe: self.atmosphere_exe.clone(),
            coupler_exe: self.coupler_exe.clone(),
            wall_time: self.wall_time.clone(),
            account: self.account.clone(),
            gpu_mode: self.gpu_mode,
            dummy_day: self.dummy_day,
            module_purge: self.module_purge,
            modules_opt: self.modules_opt,
            tasks_per_node: self.tasks_per_node,
            nprocx: self.nprocx,
            nprocy: self.nprocy,
            coupler_tasks: self.coupler_tasks,
            gen_oasis: self.gen_oasis.then_some(true),
        }
    }
}

fn main() -> CaseResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Create(args) => cmd_create(&args),
        Commands::Control { descriptor } => cmd_control(&descriptor),
        Commands::Advance { descriptor, submit } => cmd_advance(&descriptor, submit),
        Commands::Show { descriptor, json } => cmd_show(&descriptor, json),
    }
}

fn cmd_create(args: &CreateArgs) -> CaseResult<()> {
    let setup = match &args.setup_file {
        Some(path) => load_setup_file(path)?,
        None => SetupFile::default(),
    };
    let params = args
        .options()
        .merge(setup.main.clone())
        .into_params(|key| std::env::var(key).ok())?;

    let log = format!("Setting up case {} in {}", params.name, params.path.display());
    println!("{}\n{}", log, "-".repeat(log.len()));

    if !args.sync_from.is_empty() {
        fs::create_dir_all(&params.path).map_err(|source| CaseError::Io {
            path: params.path.clone(),
            source,
        })?;
        let rsync = Rsync::default();
        for src in &args.sync_from {
            // Trailing slash: copy the contents, not the directory itself.
            let src = PathBuf::from(format!("{}/", src.display()));
            rsync.sync(&src, &params.path, None)?;
        }
    }

    let case = Case::create_with(params, &setup.change_par, &setup.del_par)?;
    print_chunk(&case);

    if args.no_submit {
        println!("✓ Case created, not submitted");
    } else {
        case.submit(&SlurmScheduler::default())?;
        println!("✓ Case created and submitted");
    }
    Ok(())
}

fn cmd_control(descriptor: &Path) -> CaseResult<()> {
    let mut case = Case::open(descriptor)?;
    case.run(&SrunLauncher::default())?;
    advance_and_maybe_submit(&mut case, &SlurmScheduler::default(), true)
}

fn cmd_advance(descriptor: &Path, submit: bool) -> CaseResult<()> {
    let mut case = Case::open(descriptor)?;
    advance_and_maybe_submit(&mut case, &SlurmScheduler::default(), submit)
}

fn advance_and_maybe_submit(case: &mut Case, scheduler: &dyn BatchScheduler, submit: bool) -> CaseResult<()> {
    match case.advance()? {
        Transition::Continue(_) => {
            print_chunk(case);
            if submit {
                case.submit(scheduler)?;
                info!(name = case.name(), "submitted next chunk");
            }
        }
        Transition::Terminal => {
            println!("✓ Case {} is complete", case.name());
        }
    }
    Ok(())
}

fn cmd_show(descriptor: &Path, json: bool) -> CaseResult<()> {
    let case = Case::load(descriptor)?;
    let summary = case.summary();
    if json {
        let text = serde_json::to_string_pretty(&summary).map_err(|e| CaseError::InvalidValue {
            what: "case summary".to_string(),
            reason: e.to_string(),
        })?;
        println!("{}", text);
        return Ok(());
    }

    println!("Case {} in {}", summary.name, summary.path.display());
    println!("  Simulation: {} -> {}", summary.start_date, summary.end_date);
    println!(
        "  Chunk:      {} -> {} ({} h)",
        summary.chunk_start, summary.chunk_end, summary.chunk_hours
    );
    println!("  State:      {}", case.state());
    println!(
        "  Layout:     {} tasks on {} nodes",
        summary.total_tasks, summary.node_count
    );
    for line in &summary.rank_map {
        println!("    {}", line);
    }
    Ok(())
}

fn print_chunk(case: &Case) {
    println!(
        "  Chunk {} -> {} ({})",
        format_case_date(&case.period().start),
        format_case_date(&case.period().end),
        case.state()
    );
}
