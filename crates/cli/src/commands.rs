use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Transfer every configured collection
    Run {
        #[arg(long, help = "Config file path")]
        config: String,

        #[arg(long, help = "Optional .env file used for ${VAR} placeholders")]
        env_file: Option<String>,

        #[arg(long, help = "Read and count, but never write to or delete from the destination")]
        dry_run: bool,

        #[arg(
            long = "loop",
            help = "Repeat transit cycles until interrupted"
        )]
        run_loop: bool,

        #[arg(
            long,
            help = "If specified, writes the JSON report to this file instead of stdout"
        )]
        output: Option<String>,
    },
    /// Count the source documents past each iterative collection's checkpoint
    Lag {
        #[arg(long, help = "Config file path")]
        config: String,

        #[arg(long, help = "Optional .env file used for ${VAR} placeholders")]
        env_file: Option<String>,

        #[arg(long, help = "Only inspect this collection")]
        collection: Option<String>,

        #[arg(
            long,
            help = "If set, prints the lag as JSON instead of a table"
        )]
        json: bool,
    },
    /// Print the resolved per-collection settings without connecting
    Validate {
        #[arg(long, help = "Config file path")]
        config: String,

        #[arg(long, help = "Optional .env file used for ${VAR} placeholders")]
        env_file: Option<String>,
    },
}
