use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use loadplan_core::compose::solve_pallets_then_containers;
use loadplan_core::config::SolverConfig;
use loadplan_core::export::{solution_to_json, solution_to_json_pretty, summary_json};
use loadplan_core::model::{PlanStats, Solution};
use loadplan_core::solver::PackingSolver;
use loadplan_core::staging::{
    expand_containers, expand_pallets, expand_products, validate_containers, validate_items,
    ContainerSpec, PalletSpec, ProductSpec,
};
use serde::Deserialize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "loadplan",
    about = "Solve 3D pallet/container load plans from JSON problem files",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Solve a problem file and write the placement plan
    Solve(SolveArgs),
    /// Solve and print only the per-container load summary
    Summary(SolveArgs),
}

#[derive(Parser, Debug, Clone)]
struct SolveArgs {
    // Input/Output
    /// Problem JSON file ({"products": [...], "pallets": [...], "containers": [...]})
    #[arg(help_heading = "Input/Output")]
    input: PathBuf,
    /// Output file; stdout when omitted
    #[arg(short, long, help_heading = "Input/Output")]
    out: Option<PathBuf>,
    /// Pretty-print the plan JSON
    #[arg(long, default_value_t = false, help_heading = "Input/Output")]
    pretty: bool,
}

/// Problem file: product lines plus pallet and/or container lines. With
/// both present the nested pallets-in-container mode runs.
#[derive(Debug, Deserialize)]
struct ProblemFile {
    #[serde(default)]
    products: Vec<ProductSpec>,
    #[serde(default)]
    pallets: Vec<PalletSpec>,
    #[serde(default)]
    containers: Vec<ContainerSpec>,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_problem(path: &PathBuf) -> anyhow::Result<ProblemFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading problem file {}", path.display()))?;
    let problem: ProblemFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing problem file {}", path.display()))?;
    if problem.products.is_empty() {
        anyhow::bail!("problem file has no products");
    }
    if problem.pallets.is_empty() && problem.containers.is_empty() {
        anyhow::bail!("problem file has neither pallets nor containers");
    }
    Ok(problem)
}

fn solve_problem(problem: &ProblemFile) -> anyhow::Result<(Solution, Option<Solution>)> {
    let items = expand_products(&problem.products);
    let pallets = expand_pallets(&problem.pallets);
    let containers = expand_containers(&problem.containers);
    validate_items(&items)?;
    validate_containers(&pallets)?;
    validate_containers(&containers)?;

    let config = SolverConfig::default();
    config.validate()?;

    if !pallets.is_empty() && !containers.is_empty() {
        info!(
            products = items.len(),
            pallets = pallets.len(),
            containers = containers.len(),
            "running nested pallets-in-container solve"
        );
        let nested = solve_pallets_then_containers(items, pallets, containers, &config)?;
        return Ok((nested.containers, Some(nested.pallets)));
    }

    let bins = if pallets.is_empty() { containers } else { pallets };
    info!(
        products = items.len(),
        bins = bins.len(),
        "running single-level solve"
    );
    let mut solver =
        PackingSolver::with_config(bins, items, Default::default(), (0.0, 0.0, 0.0), config);
    Ok((solver.solve(), None))
}

fn write_output(path: Option<&PathBuf>, content: &str) -> anyhow::Result<()> {
    match path {
        Some(p) => {
            fs::write(p, content).with_context(|| format!("writing plan to {}", p.display()))?;
            info!(path = %p.display(), "plan written");
        }
        None => println!("{content}"),
    }
    Ok(())
}

fn run_solve(args: &SolveArgs) -> anyhow::Result<()> {
    let problem = load_problem(&args.input)?;
    let (plan, pallet_plan) = solve_problem(&problem)?;

    let stats = PlanStats::of(&plan);
    info!(
        containers = stats.containers_used,
        placed = stats.items_placed,
        unused = stats.items_unused,
        "solve finished"
    );

    let payload = match pallet_plan {
        Some(pallets) => {
            let nested = serde_json::json!({ "pallets": pallets, "containers": plan });
            if args.pretty {
                serde_json::to_string_pretty(&nested)?
            } else {
                serde_json::to_string(&nested)?
            }
        }
        None => {
            if args.pretty {
                solution_to_json_pretty(&plan)?
            } else {
                solution_to_json(&plan)?
            }
        }
    };
    write_output(args.out.as_ref(), &payload)
}

fn run_summary(args: &SolveArgs) -> anyhow::Result<()> {
    let problem = load_problem(&args.input)?;
    let (plan, _) = solve_problem(&problem)?;
    let summary = summary_json(&plan);
    write_output(args.out.as_ref(), &serde_json::to_string_pretty(&summary)?)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match &cli.command {
        Commands::Solve(args) => run_solve(args),
        Commands::Summary(args) => run_summary(args),
    }
}
