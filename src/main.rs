use anyhow::Result;
use trashkeeper::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run()
}
