//! services/client/src/bin/justgo.rs

use clap::{Parser, Subcommand};
use client_lib::{
    adapters::{FileCredentialStore, MemoryCredentialStore, ReqwestTransport},
    config::Config,
    dashboard::{Dashboard, DashboardState, Tab},
    error::ClientError,
    gateway::GatewayError,
    state::AppState,
};
use justgo_core::domain::SessionStatus;
use justgo_core::ports::CredentialStore;
use std::io::BufRead;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line client for the JustGo travel planner API.
#[derive(Parser, Debug)]
#[command(name = "justgo", version)]
struct Cli {
    /// Keep the session in memory only; nothing is read from or written to disk.
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and remember the session.
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted.
        #[arg(long, env = "JUSTGO_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Create an account. Sign in afterwards with `login`.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "JUSTGO_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session.
    Logout,
    /// Show who is signed in.
    Status,
    /// Load the overview, trips and destinations.
    Dashboard,
    /// Show the weather for a city.
    Weather {
        #[arg(long)]
        city: Option<String>,
    },
    /// Check that the API is up.
    Health,
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let cli = Cli::parse();
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. Using API at {}", config.api_url);

    // --- 2. Initialize Adapters ---
    let transport = Arc::new(ReqwestTransport::new(
        config.api_url.clone(),
        config.request_timeout,
    )?);
    let store: Arc<dyn CredentialStore> = if cli.ephemeral {
        Arc::new(MemoryCredentialStore::new())
    } else {
        Arc::new(FileCredentialStore::new(config.credentials_path.clone()))
    };

    // --- 3. Build the Shared AppState & Restore Any Saved Session ---
    let app = AppState::new(config.clone(), transport, store);
    app.auth.bootstrap();

    // --- 4. Run the Command ---
    match cli.command {
        Command::Login { email, password } => {
            let password = password_or_stdin(password)?;
            let user = app.auth.login(&email, &password).await?;
            println!("Login successful. Signed in as {}", user.email);
        }
        Command::Register { email, password } => {
            let password = password_or_stdin(password)?;
            let message = app.auth.register(&email, &password).await?;
            println!("{}", message);
        }
        Command::Logout => {
            app.auth.logout();
            println!("Signed out.");
        }
        Command::Status => print_status(&app),
        Command::Dashboard => {
            let dashboard = app.dashboard();
            let result = dashboard.load().await;
            report_expiry(&app, result.as_ref().err());
            result?;
            print_dashboard(&dashboard.state());
        }
        Command::Weather { city } => {
            let dashboard = app.dashboard();
            if let Some(city) = city {
                dashboard.select_city(&city).await?;
            }
            let result = dashboard.select_tab(Tab::Weather).await;
            report_expiry(&app, result.as_ref().err());
            result?;
            print_weather(&dashboard);
        }
        Command::Health => {
            let health = app.health().await?;
            println!(
                "API status: {} (version {}, database {})",
                health.status,
                health.version.as_deref().unwrap_or("unknown"),
                health.database.as_deref().unwrap_or("unknown"),
            );
        }
    }

    Ok(())
}

fn password_or_stdin(password: Option<String>) -> Result<String, ClientError> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn report_expiry(app: &AppState, error: Option<&GatewayError>) {
    if matches!(error, Some(GatewayError::SessionExpired))
        && app.session.status() == SessionStatus::SessionExpired
    {
        eprintln!("Your session has expired. Run `justgo login` to sign in again.");
        app.auth.acknowledge_expiry();
    }
}

fn print_status(app: &AppState) {
    let session = app.session.current();
    match (session.status(), session.user()) {
        (SessionStatus::Authenticated, Some(user)) => {
            println!("Signed in as {} (user {})", user.email, user.id)
        }
        _ => println!("Not signed in."),
    }
}

fn print_dashboard(state: &DashboardState) {
    if let Some(overview) = state.overview.data() {
        let stats = &overview.user_stats;
        println!(
            "Trips: {} total, {} upcoming, {} completed",
            stats.total_trips, stats.upcoming_trips, stats.completed_trips
        );
        for trip in &overview.recent_trips {
            println!("  recent: {} on {} ({}, {})", trip.destination, trip.date, trip.duration, trip.status);
        }
        if let Some(weather) = &overview.weather_info {
            println!(
                "Weather in {}: {}, {}, humidity {}",
                weather.current_location, weather.temperature, weather.condition, weather.humidity
            );
        }
    }
    if let Some(trips) = state.trips.data() {
        println!("My trips:");
        for trip in trips {
            println!("  {} - {} ({}), budget {}", trip.destination, trip.date, trip.status, trip.budget);
            if !trip.activities.is_empty() {
                println!("    activities: {}", trip.activities.join(", "));
            }
        }
    }
    if let Some(destinations) = state.destinations.data() {
        println!("Recommended destinations:");
        for destination in destinations {
            println!(
                "  {} ({}/5, {}, best {})",
                destination.name, destination.rating, destination.price_range, destination.best_time
            );
        }
    }
}

fn print_weather(dashboard: &Dashboard) {
    let state = dashboard.state();
    match (state.weather.data(), state.weather.error()) {
        (Some(report), _) => {
            println!(
                "Current weather in {}: {}, {}, humidity {}",
                report.city, report.weather.temp, report.weather.condition, report.weather.humidity
            );
            for day in &report.forecast {
                println!("  {}: {}, {}", day.day, day.temp, day.condition);
            }
        }
        (None, Some(error)) => eprintln!("{}", error),
        (None, None) => println!("No weather available for {}", state.selected_city),
    }
}
