//! The `dashboard` subcommand.

use clap::Args;

use crate::{config::OUTPUT_PATH, dashboard, prelude::*};

/// Options for the `dashboard` subcommand.
#[derive(Debug, Args)]
pub struct DashboardOpts {
    /// Address to serve the dashboard on (host:port).
    #[clap(long, default_value = "127.0.0.1:8501")]
    pub bind: String,

    /// The batch output file to display.
    #[clap(long = "data", default_value = OUTPUT_PATH)]
    pub data_path: PathBuf,
}

/// Run the `dashboard` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_dashboard(opts: &DashboardOpts) -> Result<()> {
    dashboard::serve(&opts.bind, opts.data_path.clone()).await
}
