//! `walkdir ci`: run the CI plan for the toolchain under test.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;
use walkdir_ci::{
    CiConfig, CiError, CiPipeline, CiPlan, DependencyPin, PipelineResult, ProcessExecutor,
    ScriptRevision,
};

#[derive(Args, Debug, Clone)]
pub struct CiArgs {
    /// Toolchain under test [default: $TRAVIS_RUST_VERSION, else empty]
    #[arg(long)]
    pub rust_version: Option<String>,

    /// Version literal that identifies the MSRV toolchain [default: $WALKDIR_MSRV, else 1.74.0]
    #[arg(long)]
    pub msrv: Option<String>,

    /// Script variant to reproduce (pin-dependency, skip-tests-on-msrv)
    #[arg(long, default_value_t = ScriptRevision::default())]
    pub revision: ScriptRevision,

    /// Dependency pinned on MSRV by the pin-dependency variant
    #[arg(long, value_name = "PKG@VERSION", default_value_t = DependencyPin::default())]
    pub pin: DependencyPin,

    /// Cargo program to invoke [default: $CARGO, else cargo]
    #[arg(long)]
    pub cargo: Option<String>,

    /// Workspace to run cargo in (default: current directory)
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,

    /// Per-stage timeout in seconds (0 = none)
    #[arg(long, default_value_t = 0)]
    pub timeout_secs: u64,

    /// Print the plan without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the plan or the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl CiArgs {
    /// The environment's configuration with explicit flags applied on top.
    pub fn to_config(&self) -> CiConfig {
        self.apply(CiConfig::from_env())
    }

    fn apply(&self, mut config: CiConfig) -> CiConfig {
        if let Some(version) = &self.rust_version {
            config.rust_version = version.clone();
        }
        if let Some(msrv) = &self.msrv {
            config.msrv = msrv.clone();
        }
        if let Some(cargo) = &self.cargo {
            config.cargo = cargo.clone();
        }
        config.revision = self.revision;
        config.pin = self.pin.clone();
        config.workspace = self.workspace.clone();
        config.timeout_secs = self.timeout_secs;
        config
    }
}

/// Run `walkdir ci`, returning the exit code for the process.
pub async fn cmd_ci(args: &CiArgs) -> Result<i32> {
    let config = args.to_config();
    let plan = CiPlan::build(&config).context("Failed to build CI plan")?;

    if args.dry_run {
        let mut stdout = io::stdout().lock();
        if args.json {
            writeln!(stdout, "{}", serde_json::to_string_pretty(&plan)?)?;
        } else {
            write_plan_text(&mut stdout, &plan)?;
        }
        return Ok(0);
    }

    // JSON mode keeps stdout for the report, so child output is captured.
    let executor = if args.json {
        ProcessExecutor::capturing()
    } else {
        ProcessExecutor::inherit()
    };
    let result = CiPipeline::run(&executor, &plan).await;
    info!(run_id = %result.run_id, exit_code = result.exit_code(), "CI finished");

    let mut stdout = io::stdout().lock();
    if args.json {
        writeln!(stdout, "{}", result.to_json()?)?;
    } else {
        write_result_text(&mut stdout, &result)?;
    }
    stdout.flush()?;
    Ok(result.exit_code())
}

/// Exit code for a `walkdir ci` run that failed before any stage ran.
pub fn failure_exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<CiError>()
        .map(CiError::exit_code)
        .unwrap_or(1)
}

fn write_plan_text(mut out: impl Write, plan: &CiPlan) -> io::Result<()> {
    writeln!(out, "Toolchain: {:?} ({})", plan.rust_version, plan.channel)?;
    writeln!(out, "Revision: {}", plan.revision)?;
    writeln!(out, "Plan digest: {}", plan.digest)?;
    for stage in &plan.stages {
        writeln!(out, "+ {}", stage.command_line())?;
    }
    if plan.early_exit {
        writeln!(out, "(exit 0 before tests)")?;
    }
    Ok(())
}

fn write_result_text(mut out: impl Write, result: &PipelineResult) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Run ID: {}", result.run_id)?;
    let status = if result.success { "✓ PASSED" } else { "✗ FAILED" };
    writeln!(out, "Status: {}", status)?;
    writeln!(out, "Duration: {}ms", result.duration_ms)?;
    writeln!(out)?;
    for stage in &result.stages {
        let mark = if stage.passed() { "✓" } else { "✗" };
        writeln!(
            out,
            "  {} {} ({}ms, exit code: {})",
            mark, stage.stage_name, stage.duration_ms, stage.exit_code
        )?;
    }
    for name in &result.not_run {
        writeln!(out, "  - {} (not run)", name)?;
    }
    Ok(())
}
