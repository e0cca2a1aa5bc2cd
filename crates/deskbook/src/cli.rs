use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "deskbook")]
#[command(about = "Desk booking automation for the coworking member platform")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Config file (defaults to ~/.config/deskbook/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect or replace the captured bearer token
    Token {
        #[command(subcommand)]
        cmd: TokenCommands,
    },

    /// Feed observed browser traffic to token capture
    Capture {
        #[command(subcommand)]
        cmd: CaptureCommands,
    },

    /// Discover and select bookable locations
    Locations {
        #[command(subcommand)]
        cmd: LocationCommands,
    },

    /// Show or reconcile known bookings
    Bookings {
        #[command(subcommand)]
        cmd: BookingCommands,
    },

    /// Book a desk on each given date (YYYY-MM-DD)
    Book {
        #[arg(required = true)]
        dates: Vec<String>,

        /// Also book the configured non-working day
        #[arg(long)]
        no_skip: bool,

        /// Schedule reminders this many days before each booked date
        #[arg(long, value_name = "DAYS")]
        remind: Option<u32>,
    },

    /// Schedule reminders ahead of booked dates
    Remind {
        /// Days before each booking the reminder fires
        #[arg(long)]
        lead_days: u32,

        /// Booking dates; defaults to every upcoming booking
        dates: Vec<String>,
    },

    /// Run in the foreground and deliver scheduled reminders
    Watch,

    /// Serve the browser extension over native messaging (stdin/stdout)
    Host,

    /// Show/manage configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Show the stored token (masked) and when it was captured
    Show {
        /// Print the full token
        #[arg(long)]
        reveal: bool,
    },
    /// Store a token explicitly
    Set {
        token: String,

        /// Auxiliary header to keep alongside the token (`name: value`)
        #[arg(long = "header", value_name = "NAME: VALUE")]
        headers: Vec<String>,
    },
    /// Forget the stored token
    Clear,
}

#[derive(Subcommand)]
pub enum CaptureCommands {
    /// Offer one request's headers to the capture listener
    Header {
        /// Request URL
        #[arg(long)]
        url: String,

        /// Request header (`name: value`), repeatable
        #[arg(long = "header", value_name = "NAME: VALUE", required = true)]
        headers: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum LocationCommands {
    /// List locations for a city
    List {
        /// City slug, e.g. bangalore
        #[arg(long)]
        city: Option<String>,

        /// Only show locations whose name or city contains this text
        #[arg(long)]
        search: Option<String>,

        /// Saved platform page used for city hints and as a last-resort source
        #[arg(long, value_name = "FILE")]
        page_html: Option<PathBuf>,

        /// URL the saved page was loaded from
        #[arg(long)]
        page_url: Option<String>,
    },
    /// Make a location active by its location id
    Select {
        location_id: String,

        #[arg(long)]
        city: Option<String>,

        #[arg(long, value_name = "FILE")]
        page_html: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum BookingCommands {
    /// Upcoming bookings known locally
    List,
    /// Pull upcoming bookings from the platform into the local ledger
    Sync,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a commented template to the config path
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show the effective configuration
    Show,
}
