//! Supplier Export CLI - reshape an order export into a supplier file
//!
//! ```bash
//! supplier-export --orders orders.csv --config configs/acme.yaml
//! supplier-export --orders orders.xlsx --config configs/acme.yaml --outdir out --output po_march
//! ```
//!
//! The written path is printed on stdout; the run log goes to stderr.

use clap::Parser;
use std::path::PathBuf;
use supplier_export::logs::RUN_LOG;
use supplier_export::{run, RunOptions};

#[derive(Parser)]
#[command(name = "supplier-export")]
#[command(about = "Reformat order exports into supplier-specific CSV/XLSX files", long_about = None)]
struct Cli {
    /// Order export (CSV, XLSX or XLS)
    #[arg(long)]
    orders: PathBuf,

    /// Supplier config (YAML)
    #[arg(long)]
    config: PathBuf,

    /// Output directory
    #[arg(long, env = "SUPPLIER_EXPORT_OUTDIR", default_value = "out")]
    outdir: PathBuf,

    /// Output file name (default: from delivery.filename_pattern)
    #[arg(long)]
    output: Option<String>,

    /// Do not print the run log
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    RUN_LOG.set_quiet(cli.quiet);

    let options = RunOptions {
        orders: cli.orders,
        config: cli.config,
        outdir: cli.outdir,
        output_name: cli.output,
    };

    match run(&options) {
        Ok(summary) => println!("{}", summary.path.display()),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
