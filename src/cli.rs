use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vrc")]
#[command(
    version,
    about = "Visual Regression Checker - Compare rendered theme pages against design mock-ups",
    long_about = "Visual Regression Checker (VRC)\n\nModes:\n- run: capture every page at every viewport from the config file, diff each screenshot against its mock-up and write JSON + HTML reports.\n- diff: compare two local images with the same engine.\n\nExit code 0 means every comparison passed; 1 means at least one failed or an error occurred.\nUse --help on any subcommand for details."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose (debug) logging on stderr")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Config file (TOML, YAML or JSON); defaults to ./vrc.toml. CLI flags override config"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value = "json",
        help = "Output format"
    )]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture the page x viewport matrix and compare it against the mock-ups
    Run {
        #[arg(long, requires = "viewport", help = "Only capture this page id")]
        page: Option<String>,

        #[arg(long, requires = "page", help = "Only capture this viewport name")]
        viewport: Option<String>,

        #[arg(long, help = "Number of concurrent browser sessions")]
        workers: Option<usize>,

        #[arg(
            long,
            value_name = "DIR",
            help = "Directory for screenshots, diffs and reports"
        )]
        output_dir: Option<PathBuf>,

        #[arg(long, help = "Minimum match percentage (0-100) for a pass")]
        pass_threshold: Option<f64>,

        #[arg(long, short, help = "Write the summary payload to this file (stdout if omitted)")]
        output: Option<PathBuf>,
    },
    /// Compare two local images
    Diff {
        #[arg(long, help = "Captured screenshot")]
        captured: PathBuf,

        #[arg(long, help = "Reference mock-up")]
        reference: PathBuf,

        #[arg(
            long,
            default_value = "0.1",
            help = "Per-pixel colour tolerance (0-1); lower is stricter"
        )]
        threshold: f64,

        #[arg(long, help = "Count anti-aliased pixels as mismatches")]
        include_aa: bool,

        #[arg(
            long,
            default_value = "95",
            help = "Minimum match percentage (0-100) for a pass"
        )]
        pass_threshold: f64,

        #[arg(long, value_name = "PATH", help = "Write the diff image here")]
        diff_output: Option<PathBuf>,

        #[arg(long, short, help = "Write the payload to this file (stdout if omitted)")]
        output: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_accepts_single_cell() {
        let cli = Cli::try_parse_from([
            "vrc", "run", "--page", "home", "--viewport", "mobile", "--workers", "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                page,
                viewport,
                workers,
                ..
            } => {
                assert_eq!(page.as_deref(), Some("home"));
                assert_eq!(viewport.as_deref(), Some("mobile"));
                assert_eq!(workers, Some(2));
            }
            Commands::Diff { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn page_requires_viewport() {
        assert!(Cli::try_parse_from(["vrc", "run", "--page", "home"]).is_err());
        assert!(Cli::try_parse_from(["vrc", "run", "--viewport", "mobile"]).is_err());
    }

    #[test]
    fn diff_defaults() {
        let cli = Cli::try_parse_from([
            "vrc", "--format", "pretty", "diff", "--captured", "a.png", "--reference", "b.png",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Pretty);
        match cli.command {
            Commands::Diff {
                threshold,
                include_aa,
                pass_threshold,
                ..
            } => {
                assert_eq!(threshold, 0.1);
                assert!(!include_aa);
                assert_eq!(pass_threshold, 95.0);
            }
            Commands::Run { .. } => panic!("expected diff"),
        }
    }
}
