use crate::report::{run_ranking, run_score, RankingArgs, ScoreArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use mep_score::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "MEP Activity Score",
    about = "Serve and inspect term-scoped activity scores for members of the European Parliament",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the ranking of every member in a term
    Ranking(RankingArgs),
    /// Print the score breakdown of one member
    Score(ScoreArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the configured dataset directory
    #[arg(long)]
    pub(crate) data_dir: Option<std::path::PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Ranking(args) => run_ranking(args).await,
        Command::Score(args) => run_score(args).await,
    }
}
