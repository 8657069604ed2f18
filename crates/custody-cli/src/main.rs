//! Custody CLI - demo/ops tool for the Stellar custody core
//!
//! Runs end-to-end scenarios against an in-process `CustodyService`:
//!
//! ```bash
//! custody demo happy-path
//! custody demo all
//! ```

use clap::{Parser, Subcommand};
use colored::*;

mod commands;

use commands::demo;

#[derive(Parser)]
#[command(name = "custody")]
#[command(author = "Custody Core Contributors")]
#[command(version)]
#[command(about = "Demo/ops CLI for the Stellar custody core", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one or all of the end-to-end scenarios
    Demo {
        #[command(subcommand)]
        scenario: DemoScenario,
    },

    /// Print build/version information
    Status,
}

#[derive(Subcommand)]
enum DemoScenario {
    /// Happy path: HIGH_VALUE intent reaches `success` after two approvals
    HappyPath,
    /// Cold wallet outflow is always CRITICAL, regardless of amount
    ColdCritical,
    /// A used challenge response cannot be replayed against another intent
    ReplayRejection,
    /// An unapproved intent past its deadline is cancelled by the sweep
    ExpirySweep,
    /// Two approvers racing the threshold-completing approval
    ConcurrentApproval,
    /// Reconcile an intent stuck mid-execution after a simulated HSM outage
    HsmOutage,
    /// Run every scenario in sequence
    All,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    print_banner();

    match cli.command {
        Commands::Demo { scenario } => match scenario {
            DemoScenario::HappyPath => demo::happy_path().await?,
            DemoScenario::ColdCritical => demo::cold_outflow_critical().await?,
            DemoScenario::ReplayRejection => demo::replay_rejection().await?,
            DemoScenario::ExpirySweep => demo::expiry_sweep().await?,
            DemoScenario::ConcurrentApproval => demo::concurrent_nth_approval().await?,
            DemoScenario::HsmOutage => demo::hsm_outage_reconciliation().await?,
            DemoScenario::All => demo::run_all().await?,
        },
        Commands::Status => show_status(),
    }

    Ok(())
}

fn print_banner() {
    println!();
    println!("{}", "Stellar Custody Core".bright_white().bold());
    println!("{}", "─".repeat(40).bright_black());
}

fn show_status() {
    println!("  {}: {}", "version".bright_white(), env!("CARGO_PKG_VERSION"));
    println!("  {}: {}", "store".bright_white(), "in-memory (default)".bright_black());
    println!("  {}: {}", "hsm".bright_white(), "FakeHsm (reference implementation)".bright_black());
    println!("  {}: {}", "ledger".bright_white(), "FakeLedgerClient (reference implementation)".bright_black());
}
