use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Load the input file into the destination table
    Load {
        #[command(flatten)]
        target: LoadArgs,

        #[arg(long, help = "Print the final result as JSON")]
        json: bool,
    },
    /// Resolve and validate the configuration, print it, and exit
    Check {
        #[command(flatten)]
        target: LoadArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Control file (absolute path)
    pub control_file: Option<PathBuf>,

    #[arg(long, help = "Destination catalog (JSON)")]
    pub catalog: PathBuf,

    #[arg(
        long,
        default_value = ".",
        help = "Directory for default log and bad record files"
    )]
    pub output_dir: PathBuf,

    #[arg(
        short = 'o',
        long = "option",
        value_name = "KEY=VALUE",
        help = "Additional control lines, applied after the control file"
    )]
    pub options: Vec<String>,

    #[arg(short, long, help = "Debug logging and verbose rejection output")]
    pub verbose: bool,
}

impl LoadArgs {
    /// Option lines, with `VERBOSE = YES` appended for `--verbose`.
    pub fn option_lines(&self) -> Vec<String> {
        let mut lines = self.options.clone();
        if self.verbose {
            lines.push("VERBOSE = YES".to_string());
        }
        lines
    }
}
