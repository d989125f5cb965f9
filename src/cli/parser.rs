use clap::{Parser, Subcommand};

/// Command-line interface definition for shiftledger
/// Tracks driver shifts, breaks and rides in SQLite
#[derive(Parser)]
#[command(
    name = "shiftledger",
    version = env!("CARGO_PKG_VERSION"),
    about = "Driver shift and ride ledger: signals, breaks, earnings and reconciliation on SQLite",
    long_about = None
)]
pub struct Cli {
    /// Override database path (useful for tests or custom DB)
    #[arg(global = true, long = "db")]
    pub db: Option<String>,

    /// Driver identity (falls back to `default_driver` in the config)
    #[arg(global = true, long = "driver")]
    pub driver: Option<String>,

    /// Run in test mode (no config file update)
    #[arg(global = true, long = "test", hide = true)]
    pub test: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and configuration
    Init,

    /// Show the active configuration
    Config {
        #[arg(long = "print", help = "Print the current configuration")]
        print_config: bool,
    },

    /// Shift signals and history
    Shift {
        #[command(subcommand)]
        action: ShiftAction,
    },

    /// Ride lifecycle and history
    Ride {
        #[command(subcommand)]
        action: RideAction,
    },

    /// Close abandoned rides and stale shifts
    Sweep {
        #[arg(long = "mine", help = "Only reconcile the current driver")]
        mine: bool,
    },

    /// Day-by-day earnings and work time over a date range
    Stats {
        #[arg(long = "from", value_name = "YYYY-MM-DD")]
        from: String,

        #[arg(long = "to", value_name = "YYYY-MM-DD")]
        to: String,

        #[arg(long = "view", default_value = "weekly", help = "Day labels: weekly or monthly")]
        view: String,

        #[arg(long = "json", help = "Print the report as JSON")]
        json: bool,
    },

    /// Print or manage the internal log table
    Log {
        #[arg(long = "print", help = "Print rows from the internal log table")]
        print: bool,
    },
}

#[derive(Subcommand)]
pub enum ShiftAction {
    /// Open a new shift
    Start {
        #[arg(long = "at", help = "Signal time (epoch ms, RFC 3339 or YYYY-MM-DD HH:MM)")]
        at: Option<String>,

        #[arg(long = "planned", help = "Planned shift length (e.g. 8h, 7h30m)")]
        planned: Option<String>,
    },

    /// Begin a break
    Pause {
        #[arg(long = "at")]
        at: Option<String>,

        #[arg(long = "planned", help = "Planned break length (e.g. 30m)")]
        planned: Option<String>,
    },

    /// End the current break
    Continue {
        #[arg(long = "at")]
        at: Option<String>,
    },

    /// Register a zero-length break
    SkipPause {
        #[arg(long = "at")]
        at: Option<String>,
    },

    /// Close the active shift
    Stop {
        #[arg(long = "at")]
        at: Option<String>,
    },

    /// Show the active shift
    Status {
        #[arg(long = "json", help = "Print the status as JSON")]
        json: bool,
    },

    /// List past and current shifts
    List,

    /// Move the window of an ended shift
    Edit {
        id: i64,

        #[arg(long = "start")]
        start: Option<String>,

        #[arg(long = "end")]
        end: Option<String>,
    },

    /// Soft-delete an ended shift without rides
    Delete { id: i64 },

    /// Restore a soft-deleted shift
    Restore { id: i64 },
}

#[derive(Subcommand)]
pub enum RideAction {
    /// Check whether a ride may start now
    CanStart,

    /// Start a ride on the active shift
    Start {
        #[arg(long = "from", value_name = "LAT,LNG")]
        from: String,

        #[arg(long = "to", value_name = "LAT,LNG")]
        to: String,

        #[arg(long = "score", help = "Predicted ride score (1-5)")]
        score: i64,

        #[arg(long = "address")]
        address: Option<String>,

        #[arg(long = "at")]
        at: Option<String>,
    },

    /// End a ride with its fare and distance
    End {
        id: i64,

        #[arg(long = "fare", help = "Fare in cents")]
        fare: i64,

        #[arg(long = "distance", help = "Distance travelled in km")]
        distance: f64,

        #[arg(long = "at")]
        at: Option<String>,
    },

    /// Show the ride in progress
    Status {
        #[arg(long = "json")]
        json: bool,
    },

    /// List rides
    List,

    /// Change fields of an ended ride
    Edit {
        id: i64,

        #[arg(long = "set", value_name = "FIELD=VALUE", required = true)]
        set: Vec<String>,
    },

    /// Soft-delete an ended ride
    Delete { id: i64 },

    /// Restore a soft-deleted ride
    Restore { id: i64 },
}
