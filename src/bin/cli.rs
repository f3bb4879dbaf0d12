//! Transit CLI
//!
//! Command-line client for the transit backend:
//! - Log in and out
//! - List buses, stops and routes
//! - Read and send chat messages
//! - Check notifications
//! - Print a static map of the fleet

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use transit::{
    Bus, BusStatus, ClientError, Config, FileTokenStore, TokenStore, TransitClient,
};

#[derive(Parser)]
#[command(name = "transit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Command-line client for the transit tracking backend")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the usual locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// API base URL, overrides config
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the access token
    Login {
        username: String,
        /// Password (default: read from stdin)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the stored token
    Logout,

    /// Show the current user
    Whoami,

    /// List buses
    Buses {
        /// Only buses with this status
        #[arg(short, long)]
        status: Option<BusStatus>,
        /// Only buses on this route
        #[arg(short, long)]
        route: Option<i64>,
    },

    /// Show one bus
    Bus { id: i64 },

    /// List bus stops
    Stops,

    /// List routes
    Routes,

    /// Generate and print the road geometry of a route
    Shape { route_id: i64 },

    /// Show the messages of a conversation
    Messages { conversation_id: i64 },

    /// Send a message to a conversation
    Send { conversation_id: i64, text: String },

    /// List notifications
    Notifications {
        /// Only unread ones
        #[arg(short, long)]
        unread: bool,
    },

    /// Print a static map image URL centered on the fleet or one bus
    Map {
        /// Center on this bus instead of the whole fleet
        #[arg(short, long)]
        bus: Option<i64>,
        #[arg(long, default_value = "800")]
        width: u32,
        #[arg(long, default_value = "500")]
        height: u32,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<ClientError>() {
            Some(ClientError::Unauthorized) => {
                eprintln!("Session expired, run `transit login`");
            }
            _ => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }

    let tokens: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(&config.session.token_file));
    let client = TransitClient::new(&config.api, tokens)?;
    let format = cli.format;

    match cli.command {
        Commands::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => read_password()?,
            };

            match client.login(&username, &password).await {
                Ok(_) => {
                    let user = client.me().await?;
                    println!("Logged in as {} ({})", user.display_name(), user.role);
                }
                Err(ClientError::InvalidCredentials) => {
                    eprintln!("Invalid username or password");
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Logout => {
            client.logout().await?;
            println!("Logged out");
        }

        Commands::Whoami => {
            let user = client.me().await?;
            if format == OutputFormat::Json {
                print_json(&user)?;
            } else {
                println!("{} ({})", user.display_name(), user.role);
                println!("  Username: {}", user.username);
                if let Some(email) = &user.email {
                    println!("  Email:    {}", email);
                }
            }
        }

        Commands::Buses { status, route } => {
            let buses: Vec<Bus> = client
                .buses()
                .await?
                .into_iter()
                .filter(|b| status.map_or(true, |s| b.status == s))
                .filter(|b| route.map_or(true, |r| b.route_id == Some(r)))
                .collect();

            if format == OutputFormat::Json {
                print_json(&buses)?;
            } else if buses.is_empty() {
                println!("No buses.");
            } else {
                print_bus_table(&buses);
            }
        }

        Commands::Bus { id } => {
            let bus = client.bus(id).await?;
            if format == OutputFormat::Json {
                print_json(&bus)?;
            } else {
                print_bus_table(std::slice::from_ref(&bus));
            }
        }

        Commands::Stops => {
            let stops = client.stops().await?;
            if format == OutputFormat::Json {
                print_json(&stops)?;
            } else {
                println!("{:<6} {:<30} {:>10} {:>11}", "ID", "Name", "Lat", "Lon");
                println!("{}", "-".repeat(60));
                for stop in stops {
                    println!(
                        "{:<6} {:<30} {:>10.5} {:>11.5}",
                        stop.id,
                        truncate(&stop.name, 30),
                        stop.latitude,
                        stop.longitude
                    );
                }
            }
        }

        Commands::Routes => {
            let routes = client.routes().await?;
            if format == OutputFormat::Json {
                print_json(&routes)?;
            } else {
                println!("{:<6} {:<8} {:<30} {}", "ID", "Number", "Name", "Stops");
                println!("{}", "-".repeat(55));
                for route in routes {
                    println!(
                        "{:<6} {:<8} {:<30} {}",
                        route.id,
                        route.number.as_deref().unwrap_or("-"),
                        truncate(&route.name, 30),
                        route.stop_ids.len()
                    );
                }
            }
        }

        Commands::Shape { route_id } => {
            let shape = client.route_shape(route_id).await?;
            if format == OutputFormat::Json {
                print_json(&shape)?;
            } else {
                println!("Route {}: {} points", shape.route_id, shape.coordinates.len());
                for (lat, lon) in shape.lat_lon() {
                    println!("  {:.6}, {:.6}", lat, lon);
                }
            }
        }

        Commands::Messages { conversation_id } => {
            let messages = client.messages(conversation_id).await?;
            if format == OutputFormat::Json {
                print_json(&messages)?;
            } else if messages.is_empty() {
                println!("No messages.");
            } else {
                for m in messages {
                    let sender = m
                        .sender_name
                        .clone()
                        .unwrap_or_else(|| format!("user {}", m.sender_id));
                    println!(
                        "[{}] {}: {}",
                        m.created_at.format("%Y-%m-%d %H:%M"),
                        sender,
                        m.content
                    );
                }
            }
        }

        Commands::Send {
            conversation_id,
            text,
        } => {
            let message = client.send_message(conversation_id, &text).await?;
            if format == OutputFormat::Json {
                print_json(&message)?;
            } else {
                println!("Sent message {}", message.id);
            }
        }

        Commands::Notifications { unread } => {
            let notifications: Vec<_> = client
                .notifications()
                .await?
                .into_iter()
                .filter(|n| !unread || !n.is_read)
                .collect();

            if format == OutputFormat::Json {
                print_json(&notifications)?;
            } else if notifications.is_empty() {
                println!("No notifications.");
            } else {
                for n in notifications {
                    let marker = if n.is_read { " " } else { "*" };
                    println!(
                        "{} [{}] {} ({}): {}",
                        marker,
                        n.created_at.format("%Y-%m-%d %H:%M"),
                        n.title,
                        n.kind,
                        n.message
                    );
                }
            }
        }

        Commands::Map { bus, width, height } => {
            let buses = match bus {
                Some(id) => vec![client.bus(id).await?],
                None => client.buses().await?,
            };
            let (lat, lon) = fleet_center(&buses)
                .unwrap_or((config.map.center_latitude, config.map.center_longitude));

            let url = config
                .map
                .static_image_url(lat, lon, width, height)
                .context("No map access token, set [map].access_token or TRANSIT_MAP_TOKEN")?;
            println!("{}", url);
        }

        Commands::Config { output } => {
            let config = transit::config::generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

fn read_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    std::io::stderr().flush()?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;

    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("Empty password");
    }
    Ok(password)
}

/// Mean position of the buses that reported one
fn fleet_center(buses: &[Bus]) -> Option<(f64, f64)> {
    let located: Vec<_> = buses.iter().filter_map(|b| b.location.as_ref()).collect();
    if located.is_empty() {
        return None;
    }
    let n = located.len() as f64;
    let lat = located.iter().map(|l| l.latitude).sum::<f64>() / n;
    let lon = located.iter().map(|l| l.longitude).sum::<f64>() / n;
    Some((lat, lon))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_bus_table(buses: &[Bus]) {
    println!(
        "{:<6} {:<12} {:<12} {:<6} {:<22} {}",
        "ID", "Plate", "Status", "Route", "Position", "Updated"
    );
    println!("{}", "-".repeat(80));

    for bus in buses {
        let route = bus
            .route_id
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());
        let (position, updated) = match &bus.location {
            Some(loc) => (
                format!("{:.5}, {:.5}", loc.latitude, loc.longitude),
                loc.timestamp
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            None => ("-".to_string(), "-".to_string()),
        };

        println!(
            "{:<6} {:<12} {:<12} {:<6} {:<22} {}",
            bus.id,
            bus.license_plate,
            bus.status.to_string(),
            route,
            position,
            updated
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transit::Location;

    #[test]
    fn test_fleet_center_skips_unlocated() {
        let buses = vec![
            Bus::new(1, "A-1", BusStatus::Operational).at(Location::new(10.0, 70.0)),
            Bus::new(2, "A-2", BusStatus::Idle).at(Location::new(12.0, 72.0)),
            Bus::new(3, "A-3", BusStatus::Maintenance),
        ];
        assert_eq!(fleet_center(&buses), Some((11.0, 71.0)));
        assert_eq!(fleet_center(&buses[2..]), None);
    }
}
