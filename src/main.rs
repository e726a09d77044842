use anyhow::{Context, Result, bail};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use taskwave::cli::{Args, ConfigDiscovery, ExecutionMode, RunConfig, TaskLoader};
use taskwave::{
    CommandWorker, CommandWorkerConfig, LoggingEventHandler, RunStatus, SchedulerConfig,
    TaskRegistry, WaveScheduler, env, format_task_list, plan_waves,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code for unusable input: bad arguments, configuration, or task list
const EXIT_INPUT_ERROR: u8 = 4;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose());

    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INPUT_ERROR);
        }
    };

    let result = match mode {
        ExecutionMode::Run(config) => run_tasks(config).await,
        ExecutionMode::Validate {
            tasks_file,
            config_override,
        } => validate_tasks(&tasks_file, config_override.as_deref()),
        ExecutionMode::ShowConfig { config_override } => {
            ConfigDiscovery::show_discovery_info(config_override.as_deref());
            Ok(0)
        }
        ExecutionMode::InitConfig => init_config(),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_INPUT_ERROR)
        }
    }
}

/// Logs go to stderr so reports on stdout stay clean
fn init_logging(verbose: bool) {
    let default_level = if verbose { "taskwave=debug" } else { "taskwave=info" };
    let filter = EnvFilter::try_from_env(env::LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Apply command line overrides on top of the discovered configuration
fn scheduler_config(base: SchedulerConfig, run: &RunConfig) -> Result<SchedulerConfig> {
    let config = SchedulerConfig {
        max_concurrent: run.max_concurrent.unwrap_or(base.max_concurrent),
        max_waves: run.max_waves.unwrap_or(base.max_waves),
        max_retries: run.max_retries.unwrap_or(base.max_retries),
    };
    if let Err(e) = config.validate() {
        bail!("Invalid scheduler settings: {}", e);
    }
    Ok(config)
}

fn worker_config(
    configured: Option<CommandWorkerConfig>,
    run: &RunConfig,
) -> Result<CommandWorkerConfig> {
    let mut worker = match run.worker_command.split_first() {
        Some((program, args)) => {
            let mut worker = CommandWorkerConfig::new(program.clone(), args.to_vec());
            // Keep env and working dir from the config file
            if let Some(configured) = configured {
                worker.env = configured.env;
                worker.working_dir = configured.working_dir;
                worker.timeout_secs = configured.timeout_secs;
            }
            worker
        }
        None => configured.context(
            "No worker program given: pass one after `--` or set [worker] in the configuration",
        )?,
    };

    if let Some(secs) = run.timeout_secs {
        worker.timeout_secs = Some(secs);
    }
    Ok(worker)
}

async fn run_tasks(run: RunConfig) -> Result<u8> {
    let (file_config, source) = ConfigDiscovery::discover_config(run.config_override.as_deref())?;
    if let Some(path) = source {
        info!("Using configuration from {:?}", path);
    }

    let config = scheduler_config(file_config.scheduler, &run)?;
    let list = TaskLoader::load_task_list(&run.tasks_file)?;

    let mut registry = TaskRegistry::with_max_retries(config.max_retries);
    registry.replace_all(&list);
    info!("Loaded {} tasks from {:?}", registry.len(), run.tasks_file);

    if run.dry_run {
        println!("{}", format_task_list(&registry));
        println!();
        println!("{}", plan_waves(&registry, config.max_waves).render());
        return Ok(0);
    }

    let worker = CommandWorker::new(worker_config(file_config.worker, &run)?)?;
    let mut scheduler = WaveScheduler::new(config, Arc::new(worker));
    scheduler.add_event_handler(Box::new(LoggingEventHandler));

    let report = scheduler.run(&mut registry, &run.goal).await?;

    println!("{}", format_task_list(&registry));
    println!();
    println!("{}", report.summary);

    info!(
        "Run {} finished in {}s: {}",
        report.run_id,
        report.duration().num_seconds(),
        report.status
    );

    // Exit codes are 0..=3
    Ok(report.status.exit_code() as u8)
}

fn validate_tasks(path: &Path, config_override: Option<&Path>) -> Result<u8> {
    let (file_config, _) = ConfigDiscovery::discover_config(config_override)?;
    let config = file_config.scheduler;
    let list = TaskLoader::load_task_list(path)?;

    let mut registry = config.new_registry();
    registry.replace_all(&list);

    println!("{}", format_task_list(&registry));
    println!();

    let ready: Vec<&str> = registry.ready_set().iter().map(|t| t.id.as_str()).collect();
    let ready = if ready.is_empty() { "none".to_string() } else { ready.join(", ") };
    println!("Ready to start: {}", ready);

    let plan = plan_waves(&registry, config.max_waves);
    if plan.is_complete() {
        println!("All tasks are reachable in {} waves", plan.waves.len());
        Ok(0)
    } else if plan.hit_wave_limit {
        warn!(
            "Tasks not reached within {} waves: {}",
            config.max_waves,
            plan.unscheduled.join(", ")
        );
        println!(
            "Tasks beyond the wave limit of {}: {}",
            config.max_waves,
            plan.unscheduled.join(", ")
        );
        Ok(RunStatus::WaveLimitExceeded.exit_code() as u8)
    } else {
        warn!(
            "Tasks that can never start (circular dependencies): {}",
            plan.unscheduled.join(", ")
        );
        println!("Unreachable tasks: {}", plan.unscheduled.join(", "));
        Ok(2)
    }
}

fn init_config() -> Result<u8> {
    let path = ConfigDiscovery::create_default_user_config()?;
    println!("Configuration file: {:?}", path);
    Ok(0)
}
