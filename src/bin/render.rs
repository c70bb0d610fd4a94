#![cfg(not(tarpaulin_include))]

use anyhow::Context;
use clap::Parser;
use dashboard::chart::{ChartStyle, LegendPosition, Palette, save_dashboard};
use dashboard::{Aggregates, Filter, Gatekeeper, loader};
use log::info;
use std::path::PathBuf;

/// Render the dashboard figure for a local CSV without starting the server
#[derive(Parser)]
#[command(name = "render")]
struct Args {
    /// CSV file to read
    input: PathBuf,

    /// Where to write the PNG
    #[arg(short, long, default_value = "dashboard.png")]
    output: PathBuf,

    /// Password, checked against DASHBOARD_PASSWORD (or "msba")
    #[arg(long)]
    password: String,

    /// Restrict to one gender ("All" for no restriction)
    #[arg(long)]
    gender: Option<String>,

    /// Restrict to one year ("All" for no restriction)
    #[arg(long)]
    year: Option<String>,

    #[arg(long, default_value_t = 1200)]
    width: u32,

    #[arg(long, default_value_t = 900)]
    height: u32,

    #[arg(long, default_value_t = 14)]
    font_size: u32,

    #[arg(long, value_enum, default_value_t = Palette::Classic)]
    palette: Palette,

    #[arg(long, value_enum, default_value_t = LegendPosition::UpperRight)]
    legend: LegendPosition,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let secret = std::env::var("DASHBOARD_PASSWORD").unwrap_or_else(|_| "msba".to_string());
    Gatekeeper::new(&secret)?.check(&args.password)?;

    let table = loader::from_csv(&args.input)
        .with_context(|| format!("loading {}", args.input.display()))?;
    let filter = Filter::from_selection(args.gender.as_deref(), args.year.as_deref());
    let aggregates = Aggregates::compute(&table, &filter)?;

    let style = ChartStyle {
        width: args.width,
        height: args.height,
        font_size: args.font_size,
        palette: args.palette,
        legend: args.legend,
    };
    save_dashboard(&aggregates, &style, &args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;

    info!(
        "wrote {} ({} of {} records)",
        args.output.display(),
        aggregates.row_count,
        table.len()
    );
    Ok(())
}
