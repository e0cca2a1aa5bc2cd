use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

mod app;
mod bookings_cmd;
mod cli;
mod config_cmds;
mod frame;
mod host;
mod locations_cmd;
mod logging;
mod remind_cmd;
mod token_cmd;

use app::App;
use cli::{
    BookingCommands, CaptureCommands, Cli, Commands, ConfigCommands, LocationCommands,
    OutputFormat, TokenCommands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format;
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Host => run_host(config_path).await,
        Commands::Config { cmd } => {
            logging::init_stderr();
            match cmd {
                ConfigCommands::Init { force } => config_cmds::handle_config_init(config_path, force),
                ConfigCommands::Show => config_cmds::handle_config_show(config_path, format),
            }
        }
        command => {
            logging::init_stderr();
            let app = App::load(config_path)?;
            let exit_code = run_command(&app, command, format).await?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
            Ok(())
        }
    }
}

/// stdout carries protocol frames, so logging goes to a file.
async fn run_host(config_path: Option<&Path>) -> Result<()> {
    let config = app::load_config(config_path)?;
    let log_dir = config
        .storage
        .state_file
        .as_deref()
        .and_then(Path::parent)
        .map(|dir| dir.join("logs"))
        .unwrap_or_else(deskbook_config::paths::log_dir);
    let _guard = match logging::init_host_file(&log_dir) {
        Ok(guard) => Some(guard),
        Err(error) => {
            eprintln!("deskbook host: logging disabled: {error:#}");
            None
        }
    };
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "native host starting");

    let app = App::from_config(config)?;
    host::serve(Arc::new(app), tokio::io::stdin(), tokio::io::stdout()).await?;
    tracing::info!("native host stopped");
    Ok(())
}

async fn run_command(app: &App, command: Commands, format: OutputFormat) -> Result<i32> {
    match command {
        Commands::Token { cmd } => match cmd {
            TokenCommands::Show { reveal } => token_cmd::handle_token_show(app, reveal, format)?,
            TokenCommands::Set { token, headers } => {
                token_cmd::handle_token_set(app, token, headers)?
            }
            TokenCommands::Clear => token_cmd::handle_token_clear(app)?,
        },
        Commands::Capture { cmd } => match cmd {
            CaptureCommands::Header { url, headers } => {
                let captured = token_cmd::handle_capture_header(app, url, headers, format).await?;
                return Ok(if captured { 0 } else { 1 });
            }
        },
        Commands::Locations { cmd } => match cmd {
            LocationCommands::List {
                city,
                search,
                page_html,
                page_url,
            } => {
                locations_cmd::handle_locations_list(
                    app,
                    city,
                    search,
                    page_html.as_deref(),
                    page_url,
                    format,
                )
                .await?
            }
            LocationCommands::Select {
                location_id,
                city,
                page_html,
            } => {
                locations_cmd::handle_locations_select(
                    app,
                    location_id,
                    city,
                    page_html.as_deref(),
                    format,
                )
                .await?
            }
        },
        Commands::Bookings { cmd } => match cmd {
            BookingCommands::List => bookings_cmd::handle_bookings_list(app, format)?,
            BookingCommands::Sync => bookings_cmd::handle_bookings_sync(app, format).await?,
        },
        Commands::Book {
            dates,
            no_skip,
            remind,
        } => return bookings_cmd::handle_book(app, dates, no_skip, remind, format).await,
        Commands::Remind { lead_days, dates } => {
            remind_cmd::handle_remind(app, lead_days, dates, format).await?
        }
        Commands::Watch => remind_cmd::handle_watch(app).await?,
        Commands::Host | Commands::Config { .. } => {
            anyhow::bail!("command does not run against a loaded app")
        }
    }
    Ok(0)
}
