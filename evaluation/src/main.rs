use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use log::info;
use rand::prelude::*;
use rayon::prelude::*;

use maxload::{
    run_grid, run_trial, run_trial_exact, Distribution, GridConfig, GridPoint, TrialConfig,
    DEFAULT_CAPACITY,
};

#[derive(Parser)]
#[command(name = "evl", about = "run max-load evaluation experiments")]
struct Cli {
    /// Worker threads, 0 uses every available core
    #[arg(short, long, default_value_t = 0, global = true)]
    jobs: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tail probabilities of the max load over a (u, l, r) grid
    Grid(GridArgs),
    /// Space-Saving estimate next to the exact max load, one line per run
    Compare(CompareArgs),
}

#[derive(Args)]
struct GridArgs {
    #[arg(short, long, value_delimiter = ',', default_value = "200")]
    u: Vec<usize>,
    #[arg(short, long, value_delimiter = ',', default_value = "20")]
    l: Vec<usize>,
    #[arg(short, long, value_delimiter = ',', default_value = "6,7,8")]
    r: Vec<f64>,
    /// m = m_factor * 2^l
    #[arg(long, default_value_t = 1.4)]
    m_factor: f64,
    #[arg(short, long, default_value_t = 1000)]
    trials: usize,
    /// uniform, bernoulli:<p> or hamming_weight:<w>
    #[arg(short, long, default_value = "uniform")]
    dist: Distribution,
    #[arg(short, long, default_value_t = DEFAULT_CAPACITY)]
    k: usize,
    #[arg(short, long, default_value_t = 123)]
    seed: u64,
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct CompareArgs {
    #[arg(short, long, default_value_t = 64)]
    u: usize,
    #[arg(short, long, default_value_t = 12)]
    l: usize,
    #[arg(short, long, default_value_t = 1 << 12)]
    m: u64,
    #[arg(short, long, default_value_t = 256)]
    k: usize,
    #[arg(short, long, default_value = "uniform")]
    dist: Distribution,
    #[arg(short, long, default_value_t = 100)]
    runs: usize,
    #[arg(short, long, default_value_t = 0)]
    seed: u64,
    #[arg(short, long)]
    output: Option<PathBuf>,
}

struct Row(GridPoint);

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.0;
        write!(
            f,
            "{} {} {} {} {} {:.6e} {:.6e}",
            p.u, p.l, p.m, p.r, p.threshold, p.p_hat, p.theory
        )
    }
}

struct Comparison(usize, u32, u32);

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.0, self.1, self.2)
    }
}

// Runs the tail-probability grid and prints one row per (u, l, r)
fn grid(args: &GridArgs, jobs: usize) {
    let cfg = GridConfig {
        u_values: args.u.clone(),
        l_values: args.l.clone(),
        r_values: args.r.clone(),
        m_factor: args.m_factor,
        trials: args.trials,
        distribution: args.dist,
        k: args.k,
        seed: args.seed,
    };
    info!(
        "grid: {} cells x {} trials",
        cfg.u_values.len() * cfg.l_values.len(),
        cfg.trials
    );

    let points = run_grid(&cfg, jobs).unwrap();
    let rows: Vec<Row> = points.into_iter().map(Row).collect();
    save("u l m r threshold p_hat theory", &rows, args.output.as_ref());
}

// Runs every seed pair twice, once approximate and once exact
fn compare(args: &CompareArgs) {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let template = TrialConfig::new(args.u, args.l, args.m)
        .with_capacity(args.k)
        .with_distribution(args.dist);
    let configs: Vec<TrialConfig> = (0..args.runs)
        .map(|_| template.clone().with_seeds(rng.gen(), rng.gen()))
        .collect();
    info!("compare: {} runs, l = {}, k = {}", args.runs, args.l, args.k);

    let rows: Vec<Comparison> = configs
        .par_iter()
        .enumerate()
        .map(|(i, cfg)| Comparison(i, run_trial(cfg).unwrap(), run_trial_exact(cfg).unwrap()))
        .collect();

    let overestimated = rows.iter().filter(|c| c.1 != c.2).count();
    info!("{overestimated} of {} runs differ from the exact max load", rows.len());
    save("run approx exact", &rows, args.output.as_ref());
}

// Writes a header and one line per value to the given file or stdout
fn save<T>(header: &str, values: &[T], output: Option<&PathBuf>)
where
    T: fmt::Display,
{
    let mut writer: BufWriter<Box<dyn Write>> = match output {
        Some(path) => BufWriter::new(Box::new(File::create(path).unwrap())),
        None => BufWriter::new(Box::new(io::stdout())),
    };

    writeln!(writer, "{}", header).unwrap();
    for val in values {
        writeln!(writer, "{}", val).unwrap();
    }

    writer.flush().unwrap();
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.jobs)
        .build_global()
        .unwrap();

    match &cli.command {
        Command::Grid(args) => grid(args, cli.jobs),
        Command::Compare(args) => compare(args),
    }
}
