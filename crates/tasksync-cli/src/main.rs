use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "tasksync", version, about = "Sync Notion tasks to Google Calendar")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation pass
    Run {
        /// Plan the calendar calls without making them
        #[arg(long)]
        dry_run: bool,
    },
    /// Run a pass on a fixed interval until interrupted
    Watch {
        /// Seconds between passes (defaults to trigger.interval_secs)
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Listen for manual triggers on /trigger
    Serve {
        /// Listen address (defaults to trigger.bind)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print the Google OAuth consent URL
    AuthUrl {
        /// OAuth client id
        #[arg(long)]
        client_id: String,
        /// Redirect URI registered for the client
        #[arg(long)]
        redirect_uri: String,
        /// Open the URL in the default browser
        #[arg(long)]
        open: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run { dry_run } => commands::block_on(commands::run::run(dry_run)),
        Commands::Watch { interval_secs } => {
            commands::block_on(commands::watch::run(interval_secs))
        }
        Commands::Serve { bind } => commands::block_on(commands::serve::run(bind)),
        Commands::AuthUrl {
            client_id,
            redirect_uri,
            open,
        } => commands::auth_url::run(&client_id, &redirect_uri, open),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
