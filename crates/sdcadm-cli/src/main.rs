use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use sdcadm_cli::{command, is_yes, logging, plan_change, CliConfig, PlanRequest, UpdateAgentArgs};
use sdcadm_clients::HttpClients;
use sdcadm_core::prelude::*;
use sdcadm_core::{run_procedures, summarize_all, InventoryClient};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, info_span};

#[tokio::main]
async fn main() {
    let matches = command().get_matches();

    if let Err(e) = logging::init(matches.get_flag("verbose")) {
        eprintln!("sdcadm: {e:#}");
    }

    let status = match run(&matches).await {
        Ok(status) => status,
        Err(err) => {
            eprintln!("sdcadm: error: {err:#}");
            err.chain()
                .find_map(|e| e.downcast_ref::<UpgradeError>())
                .map_or(1, UpgradeError::exit_status)
        }
    };
    std::process::exit(status);
}

async fn run(matches: &ArgMatches) -> Result<i32> {
    let config_path = matches
        .get_one::<PathBuf>("config")
        .context("no config path")?;

    match matches.subcommand() {
        Some(("update-agent", args)) => {
            update_agent(config_path, UpdateAgentArgs::from_matches(args)).await
        }
        Some((name, _)) => bail!("unknown command: {name}"),
        None => bail!("no command given"),
    }
}

async fn update_agent(config_path: &Path, args: UpdateAgentArgs) -> Result<i32> {
    let mut config = CliConfig::load(config_path)?;
    if let Some(concurrency) = args.concurrency {
        config.update = config.update.with_concurrency(concurrency);
        config.update.validate()?;
    }
    let http = HttpClients::connect(&config.clients)
        .map_err(|e| UpgradeError::sdc_client("http", e))?;

    let procedure = match build_procedure(&http, &args).await {
        Ok(Some(procedure)) => procedure,
        Ok(None) => {
            println!("Nothing to do.");
            return Ok(0);
        }
        Err(err) => return Ok(report(&err)),
    };

    let plan = Plan::new(procedure.changes().to_vec());
    let procs: Vec<Box<dyn Procedure>> = vec![Box::new(procedure)];

    println!("This update will make the following changes:");
    for line in summarize_all(&procs).lines() {
        println!("    {line}");
    }
    println!();

    if args.dry_run {
        println!("[dry-run] done");
        return Ok(0);
    }
    if !args.yes && !confirm("Would you like to continue? [y/N] ").await? {
        println!("Aborting.");
        return Ok(0);
    }

    let span = info_span!("update-agent", service = %args.service, image = %args.image);
    let ctx = ExecutionContext::new(http.clients(), plan)
        .with_config(config.update)
        .with_span(span);

    let start = Instant::now();
    match run_procedures(&procs, &ctx).await {
        Ok(()) => {
            info!(elapsed_secs = start.elapsed().as_secs(), "update complete");
            println!("Updated successfully (elapsed {}s).", start.elapsed().as_secs());
            Ok(0)
        }
        Err(err) => Ok(report(&err)),
    }
}

/// Resolve the image and inventory into a procedure, if anything needs doing
async fn build_procedure(
    http: &HttpClients,
    args: &UpdateAgentArgs,
) -> Result<Option<UpdateAgentProcedure>, UpgradeError> {
    let image = http
        .imgapi
        .get_image(&args.image)
        .await
        .map_err(|e| UpgradeError::sdc_client("imgapi", e))?;
    let instances = http
        .inventory
        .list_instances(std::slice::from_ref(&args.service))
        .await
        .map_err(|e| UpgradeError::sdc_client("inventory", e))?;

    let request = PlanRequest {
        service: args.service.clone(),
        servers: args.servers.clone(),
    };
    match plan_change(&request, image, instances)? {
        Some(change) => UpdateAgentProcedure::new(vec![change]).map(Some),
        None => Ok(None),
    }
}

async fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let answer = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await
    .context("prompt task failed")??;
    Ok(is_yes(&answer))
}

fn report(err: &UpgradeError) -> i32 {
    error!(code = err.code().as_str(), "update failed");
    eprintln!("sdcadm: error ({}): {err}", err.code().as_str());
    err.exit_status()
}
