use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "cognspective")]
#[command(about = "Teaching session capture and evaluation service", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Run the HTTP service (default)
    Serve,
    /// List stored sessions
    History(HistoryCliArgs),
    /// Print one stored session as JSON
    Show(ShowCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct HistoryCliArgs {
    /// Only show sessions for this subject
    #[arg(short, long)]
    pub subject: Option<String>,
    /// Maximum number of results to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

#[derive(ClapArgs, Debug)]
pub struct ShowCliArgs {
    /// Stored session ID
    pub id: i64,
}
