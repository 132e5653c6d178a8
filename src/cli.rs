use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use crate::api::{AppState, run_http_server};
use crate::core::{RawSimulationInput, SimulationConstants, simulate};
use crate::store::SqliteScenarioStore;

#[derive(Parser, Debug)]
#[command(
    name = "invoice-roi",
    about = "ROI projection for moving accounts-payable invoice processing from manual to automated"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API and web UI.
    Serve(ServeArgs),
    /// Run one simulation and print it as JSON.
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, short, env = "PORT", default_value_t = 8080)]
    pub port: u16,
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,
    #[arg(
        long,
        env = "ROI_DB_PATH",
        default_value = "roi_scenarios.db",
        help = "SQLite database file for saved scenarios"
    )]
    pub db: String,
}

#[derive(Args, Debug, Default)]
pub struct SimulateArgs {
    #[arg(long, allow_negative_numbers = true)]
    pub monthly_invoice_volume: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub num_ap_staff: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub avg_hours_per_invoice: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub hourly_wage: Option<f64>,
    #[arg(
        long,
        allow_negative_numbers = true,
        help = "Manual error rate in percent, e.g. 2.5"
    )]
    pub error_rate_manual: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub error_cost: Option<f64>,
    #[arg(long, allow_negative_numbers = true, help = "Defaults to 36")]
    pub time_horizon_months: Option<f64>,
    #[arg(long, allow_negative_numbers = true, help = "Defaults to 50000")]
    pub one_time_implementation_cost: Option<f64>,
}

impl From<SimulateArgs> for RawSimulationInput {
    fn from(args: SimulateArgs) -> Self {
        let field = |v: Option<f64>| v.map(Value::from);
        RawSimulationInput {
            monthly_invoice_volume: field(args.monthly_invoice_volume),
            num_ap_staff: field(args.num_ap_staff),
            avg_hours_per_invoice: field(args.avg_hours_per_invoice),
            hourly_wage: field(args.hourly_wage),
            error_rate_manual: field(args.error_rate_manual),
            error_cost: field(args.error_cost),
            time_horizon_months: field(args.time_horizon_months),
            one_time_implementation_cost: field(args.one_time_implementation_cost),
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let constants = SimulationConstants::default();
    match cli.command {
        Command::Serve(args) => {
            let store = SqliteScenarioStore::open(&args.db)
                .with_context(|| format!("opening scenario store at {}", args.db))?;
            log::info!(
                "Scenario store ready at {}",
                store.path().unwrap_or(":memory:")
            );

            let state = AppState::new(Arc::new(store), constants);
            let addr = SocketAddr::new(args.bind, args.port);
            run_http_server(addr, state)
                .await
                .with_context(|| format!("HTTP server on {addr}"))
        }
        Command::Simulate(args) => {
            let output = simulate(&args.into(), &constants);
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
    }
}
