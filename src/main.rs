use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{prelude::*, ui::Ui};

mod agent;
mod cmd;
mod command;
mod config;
mod dashboard;
mod drivers;
mod pipeline;
mod prelude;
mod product;
mod prompt;
mod recognizers;
#[cfg(test)]
mod testing;
mod ui;

/// Extract product listings from supermarket leaflet images.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Environment Variables:
  - OPENAI_API_KEY: The OpenAI key to use. Required by `extract`.
  - OPENAI_API_BASE (optional): Override the server URL.
  - RUST_LOG (optional): Log filter, for example `debug`.

  These variables may be set in a standard `.env` file.

Workflow:
  1. Put I&M_Image_2.jpg and I_and_m_image4.jpg in the current directory.
  2. Run `leaflet-extractor extract` to write data.json.
  3. Run `leaflet-extractor dashboard` and open the printed URL.
"#
)]
struct Opts {
    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// Recognize text in the leaflet images and extract products to data.json.
    Extract(cmd::extract::ExtractOpts),
    /// Serve a local web dashboard for reviewing and exporting data.json.
    Dashboard(cmd::dashboard::DashboardOpts),
    /// Print the JSON Schema for product records.
    Schema(cmd::schema::SchemaOpts),
}

impl Cmd {
    /// Are we using stdout for output?
    fn using_stdout_for_output(&self) -> bool {
        match self {
            Cmd::Extract(_) | Cmd::Dashboard(_) => false,
            Cmd::Schema(opts) => opts.output_path.is_none(),
        }
    }
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);
    tracing_subscriber::registry().with(subscriber).init();

    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    // Load environment variables from a `.env` file, if it exists.
    dotenvy::dotenv().ok();

    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    if opts.subcmd.using_stdout_for_output() {
        ui.hide_progress_bars();
    }

    match &opts.subcmd {
        Cmd::Extract(extract_opts) => {
            cmd::extract::cmd_extract(ui, extract_opts).await?;
        }
        Cmd::Dashboard(dashboard_opts) => {
            cmd::dashboard::cmd_dashboard(dashboard_opts).await?;
        }
        Cmd::Schema(schema_opts) => {
            cmd::schema::cmd_schema(schema_opts).await?;
        }
    }
    Ok(())
}
