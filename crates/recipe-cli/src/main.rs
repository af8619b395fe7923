use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use recipe_api::Server;
use recipe_core::{wait_for_configured_store, ConfigManager, NewUser, Settings};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "recipe")]
#[command(about = "Recipe API - serve and manage the recipe database", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (json, pretty)
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Directory holding default.toml, <env>.toml and local.toml
    #[arg(long, global = true, env = "RECIPE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Configuration environment (defaults to APP_ENV or "development")
    #[arg(long, global = true)]
    env: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Override server.host
        #[arg(long)]
        host: Option<String>,

        /// Override server.port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Block until the database answers, then exit
    WaitForDb,

    /// Create a staff superuser account
    CreateSuperuser {
        #[arg(long)]
        email: String,

        #[arg(long, default_value = "")]
        name: String,

        #[arg(long, env = "RECIPE_SUPERUSER_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Validate and print the effective configuration
    CheckConfig {
        /// Print the configuration JSON schema instead
        #[arg(long)]
        schema: bool,
    },
}

#[derive(Serialize)]
struct DatabaseStatus {
    path: String,
    status: String,
}

#[derive(Serialize)]
struct CreatedUser {
    id: i64,
    email: String,
    is_staff: bool,
    is_superuser: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigManager::load(cli.config_dir.clone(), cli.env.clone())
        .context("Failed to load configuration")?;
    init_tracing(config.settings(), cli.verbose);
    config.log_loaded();

    match execute_command(&cli, config).await {
        Ok(Some(output)) => {
            print_output(&cli.output, &output)?;
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(settings: &Settings, verbose: bool) {
    let default_level = if verbose {
        "debug"
    } else {
        settings.logging.level.as_str()
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("recipe_api={default_level},recipe_core={default_level},tower_http={default_level}").into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn execute_command(cli: &Cli, config: ConfigManager) -> Result<Option<serde_json::Value>> {
    let mut settings = config.settings().clone();
    match &cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host.clone();
            }
            if let Some(port) = port {
                settings.server.port = *port;
            }
            settings.validate()?;

            let server = Server::new(settings).await?;
            server.run().await?;
            Ok(None)
        }

        Commands::WaitForDb => {
            let db = settings.database.clone();
            tokio::task::spawn_blocking(move || wait_for_configured_store(&db))
                .await
                .context("database wait task panicked")?
                .context("Database unavailable")?;

            let status = DatabaseStatus {
                path: settings.database.path.clone(),
                status: "available".to_string(),
            };
            Ok(Some(serde_json::to_value(status)?))
        }

        Commands::CreateSuperuser {
            email,
            name,
            password,
        } => {
            let db = settings.database.clone();
            let new_user = NewUser {
                email: email.clone(),
                name: name.clone(),
                password: password.clone(),
            };
            let user = tokio::task::spawn_blocking(move || {
                wait_for_configured_store(&db)?.create_superuser(&new_user)
            })
            .await
            .context("create-superuser task panicked")?
            .context("Failed to create superuser")?;

            let created = CreatedUser {
                id: user.id,
                email: user.email,
                is_staff: user.is_staff,
                is_superuser: user.is_superuser,
            };
            Ok(Some(serde_json::to_value(created)?))
        }

        Commands::CheckConfig { schema } => {
            if *schema {
                return Ok(Some(serde_json::to_value(schemars::schema_for!(Settings))?));
            }
            Ok(Some(serde_json::json!({
                "config_dir": config.config_dir().display().to_string(),
                "env": config.env(),
                "settings": settings,
            })))
        }
    }
}

fn print_output(format: &OutputFormat, value: &serde_json::Value) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Pretty => {
            print_pretty(value, 0)?;
        }
    }
    Ok(())
}

fn print_pretty(value: &serde_json::Value, depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                let key_colored = key.cyan().bold();
                match val {
                    serde_json::Value::String(s) => {
                        println!("{indent}{}: {}", key_colored, s.green());
                    }
                    serde_json::Value::Number(n) => {
                        println!("{indent}{}: {}", key_colored, n.to_string().yellow());
                    }
                    serde_json::Value::Bool(b) => {
                        let val_colored = if *b { "true".green() } else { "false".red() };
                        println!("{indent}{}: {}", key_colored, val_colored);
                    }
                    serde_json::Value::Object(_) => {
                        println!("{indent}{}:", key_colored);
                        print_pretty(val, depth + 1)?;
                    }
                    _ => {
                        println!("{indent}{}: {}", key_colored, val);
                    }
                }
            }
        }
        _ => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
    }
    Ok(())
}
