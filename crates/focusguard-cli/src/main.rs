use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod app;
mod commands;
mod playback;

#[derive(Parser)]
#[command(name = "focusguard", version, about = "FocusGuard focus timer and site blocker")]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a work session
    Start,
    /// Stop the current session and reset the counter
    Stop,
    /// Print the current session
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow the session countdown until interrupted
    Watch,
    /// Run the background loop that fires session alarms
    Daemon,
    /// Blocking rules
    Rules {
        #[command(subcommand)]
        action: commands::rules::RulesAction,
    },
    /// Blocked and allowed sites
    Sites {
        #[command(subcommand)]
        action: commands::sites::SitesAction,
    },
    /// Task management
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Pomodoro durations
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
    /// End-of-session sound
    Sound {
        #[command(subcommand)]
        action: commands::sound::SoundAction,
    },
    /// Completed pomodoro statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("FOCUSGUARD_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Start => commands::timer::start(),
        Commands::Stop => commands::timer::stop(),
        Commands::Status { json } => commands::timer::status(json),
        Commands::Watch => commands::timer::watch().await,
        Commands::Daemon => commands::daemon::run().await,
        Commands::Rules { action } => commands::rules::run(action),
        Commands::Sites { action } => commands::sites::run(action),
        Commands::Task { action } => commands::task::run(action),
        Commands::Settings { action } => commands::settings::run(action),
        Commands::Sound { action } => commands::sound::run(action).await,
        Commands::Stats { action } => commands::stats::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "focusguard", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
