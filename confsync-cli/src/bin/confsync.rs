//! The confsync CLI.

use anyhow::Result;
use structopt::StructOpt;

use confsync_cli::{Confsync, RunStatus};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Confsync::from_args();
    let status = cli.run().await?;
    if status != RunStatus::Complete {
        std::process::exit(status.exit_code());
    }
    Ok(())
}
