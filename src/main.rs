mod cli;

use anyhow::Context;
use clap::Parser;

use cli::Cli;
use shadeview::{app::ViewerApp, config::ViewerConfig};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => ViewerConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ViewerConfig::default(),
    };
    cli.apply(&mut config);

    let app = ViewerApp::new(config).context("creating the event loop")?;
    app.run().context("running the viewer")
}
