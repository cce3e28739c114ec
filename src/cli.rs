// cli.rs - Command-line interface configuration
use std::path::PathBuf;

use clap::Parser;

use shadeview::config::ViewerConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "shadeview")]
#[command(about = "Interactive shading model viewer", long_about = None)]
pub struct Cli {
    /// TOML config file; built-in defaults when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Shading model to start with (0-8)
    #[arg(short, long)]
    pub model: Option<usize>,

    /// Start with the sky background and reflections off
    #[arg(long = "no-background", default_value = "false")]
    pub no_background: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the loaded config
    pub fn apply(&self, config: &mut ViewerConfig) {
        if let Some(model) = self.model {
            config.scene.model = model;
        }
        if self.no_background {
            config.scene.draw_background = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_to_the_scene() {
        let cli = Cli::parse_from(["shadeview", "--model", "7", "--no-background"]);
        let mut config = ViewerConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.scene.model, 7);
        assert!(!config.scene.draw_background);
        assert!(cli.config.is_none());
    }

    #[test]
    fn defaults_leave_config_alone() {
        let cli = Cli::parse_from(["shadeview"]);
        let mut config = ViewerConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, ViewerConfig::default());
    }
}
