use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stillpoint::client::StillpointClient;
use stillpoint::config::{ClientPrefs, ServerConfig, DEFAULT_PORT};
use stillpoint::focus::{AudioOutput, CueSink};
use stillpoint::models::{LoginInput, SignupInput, UpdateSettingsInput};
use stillpoint::practice::{self, format_clock, SilentSink};
use stillpoint::{api, db};

#[derive(Parser)]
#[command(name = "stillpoint")]
#[command(about = "Daily focus sessions that grow a little longer each day")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Still Point server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Database file (overrides STILLPOINT_DB_PATH)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Create an account and remember its session
    Signup {
        email: String,
        username: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Log in and remember the session
    Login {
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the saved session
    Logout,
    /// Run today's focus session
    Practice {
        /// No audio cues for this run
        #[arg(long)]
        silent: bool,
    },
    /// Show stats and day-by-day history
    History,
    /// Show captured thoughts
    Thoughts,
    /// Show the public board
    Board,
    /// Show or hide yourself on the public board
    Public { visibility: Visibility },
}

#[derive(Clone, Copy, ValueEnum)]
enum Visibility {
    On,
    Off,
}

/// Initialize tracing with output to stderr (client commands) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "stillpoint=debug,tower_http=debug".into()),
    );

    if use_stderr {
        // Client commands own stdout for their own output
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn serve(port: u16, db_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    let db = match db_path.or_else(|| config.db_path.clone()) {
        Some(path) => db::Database::open(path)?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;

    tracing::info!(
        "Day 1 lasts {}s, +{}s per completed day",
        config.progression.base_seconds,
        config.progression.increment_seconds
    );

    let app = api::create_router_with_config(db, config);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Still Point server listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn prompt_password(given: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = given {
        return Ok(password);
    }
    if let Ok(password) = std::env::var("STILLPOINT_PASSWORD") {
        return Ok(password);
    }
    print!("Password: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let use_stderr = !matches!(cli.command, None | Some(Commands::Serve { .. }));
    init_tracing(use_stderr);

    let command = match cli.command {
        None => return serve(DEFAULT_PORT, None).await,
        Some(Commands::Serve { port, db }) => return serve(port, db).await,
        Some(command) => command,
    };

    let mut prefs = ClientPrefs::load();
    let mut client = StillpointClient::new(prefs.server_url.clone(), prefs.token.clone());

    match command {
        Commands::Signup {
            email,
            username,
            password,
        } => {
            let password = prompt_password(password)?;
            let user = client
                .signup(&SignupInput {
                    email,
                    username,
                    password,
                })
                .await?;
            prefs.token = client.token().map(str::to_string);
            prefs.save()?;
            println!("Welcome, {}. Day {} is waiting.", user.username, user.current_day);
        }
        Commands::Login { email, password } => {
            let password = prompt_password(password)?;
            let user = client.login(&LoginInput { email, password }).await?;
            prefs.token = client.token().map(str::to_string);
            prefs.save()?;
            println!("Logged in as {} (day {}).", user.username, user.current_day);
        }
        Commands::Logout => {
            if let Err(e) = client.logout().await {
                tracing::warn!("Server logout failed: {}", e);
            }
            prefs.token = None;
            prefs.save()?;
            println!("Logged out.");
        }
        Commands::Practice { silent } => {
            let sink: &dyn CueSink = if silent {
                &SilentSink
            } else {
                AudioOutput::acquire()
            };
            practice::run(client, &mut prefs, sink).await?;
            prefs.save()?;
        }
        Commands::History => {
            let sessions = client.list_sessions().await?;
            let history = client.history().await?;
            let stats = sessions.stats;
            println!(
                "Streak {} · avg {}% clear · {:.1} thoughts/session · {:.1} thoughts/min",
                stats.streak,
                stats.avg_clear_percent,
                stats.avg_thoughts_per_session,
                stats.avg_thoughts_per_minute
            );
            for entry in history {
                match entry.day {
                    None => println!("{}  missed", entry.date),
                    Some(day) => println!(
                        "{}  day {:>3}  {} / {}  {:>3}% clear  {} thoughts{}",
                        entry.date,
                        day,
                        format_clock(entry.actual_time as f64),
                        format_clock(entry.duration as f64),
                        entry.clear_percent,
                        entry.thought_count,
                        if entry.completed { "" } else { "  (incomplete)" }
                    ),
                }
            }
        }
        Commands::Thoughts => {
            for thought in client.list_thoughts().await? {
                let when = if thought.is_note() {
                    "note".to_string()
                } else {
                    format_clock(thought.time_in_session as f64)
                };
                println!("day {:>3}  {:>5}  {}", thought.day_number, when, thought.text);
            }
        }
        Commands::Board => {
            for (rank, entry) in client.board().await?.iter().enumerate() {
                println!(
                    "{:>2}. {:<30} day {:>3}  streak {:>3}  {:>3}% clear  {} sessions",
                    rank + 1,
                    entry.username,
                    entry.current_day,
                    entry.streak,
                    entry.avg_clear,
                    entry.total_sessions
                );
            }
        }
        Commands::Public { visibility } => {
            let is_public = matches!(visibility, Visibility::On);
            let user = client
                .update_settings(&UpdateSettingsInput {
                    is_public: Some(is_public),
                })
                .await?;
            println!(
                "{} is now {} the public board.",
                user.username,
                if user.is_public { "on" } else { "off" }
            );
        }
        Commands::Serve { .. } => unreachable!("handled above"),
    }

    Ok(())
}
