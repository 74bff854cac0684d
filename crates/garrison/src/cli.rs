//! CLI argument definitions

use clap::{Parser, Subcommand, ValueEnum};
use garrison_core::{ScheduleAction, ScheduleUnit};

#[derive(Parser)]
#[command(name = "garrison")]
#[command(version, about = "Manage and monitor game servers from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output in JSON format instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show every server and its current status
    Status,

    /// Start a server
    Start {
        /// Server id
        id: String,
    },

    /// Gracefully stop a server
    Stop {
        /// Server id
        id: String,
    },

    /// Restart a server (stop, settle, start)
    Restart {
        /// Server id
        id: String,
    },

    /// Send a console command to a running server
    Send {
        /// Server id
        id: String,

        /// Command line to write to the server console
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },

    /// Follow live console output and notifications
    Attach {
        /// Only show output for this server
        id: Option<String>,
    },

    /// Show the rolling CPU/memory history of a server
    History {
        /// Server id
        id: String,
    },

    /// Create, list, restore and delete backups
    #[command(subcommand)]
    Backup(BackupCommands),

    /// Manage scheduled maintenance actions
    #[command(subcommand)]
    Schedule(ScheduleCommands),

    /// Browse files inside a server's working directory
    #[command(subcommand)]
    Files(FileCommands),

    /// Run the update tool for a server's package
    Update {
        /// Server id
        id: String,
    },

    /// Check daemon health
    Ping,

    /// Stop daemon and all processes
    Kill,
}

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Archive a server's working directory
    Create {
        /// Server id
        id: String,
    },

    /// List a server's archives, newest first
    List {
        /// Server id
        id: String,
    },

    /// Unpack an archive over the working directory
    Restore {
        /// Server id
        id: String,

        /// Archive file name, as shown by `backup list`
        filename: String,
    },

    /// Delete one archive
    Delete {
        /// Server id
        id: String,

        /// Archive file name, as shown by `backup list`
        filename: String,
    },
}

#[derive(Subcommand)]
pub enum ScheduleCommands {
    /// Add a recurring maintenance rule
    Add {
        /// Server id
        id: String,

        /// Action to run
        #[arg(value_enum)]
        action: ActionArg,

        /// Run every N units
        interval: u32,

        /// Interval unit
        #[arg(value_enum)]
        unit: UnitArg,

        /// Clock time "HH:MM" (only with the days unit)
        #[arg(long)]
        at: Option<String>,
    },

    /// List the rules of a server
    List {
        /// Server id
        id: String,
    },

    /// Remove a rule by its `schedule list` index
    Remove {
        /// Server id
        id: String,

        /// Rule index, as shown by `schedule list`
        index: usize,
    },
}

#[derive(Subcommand)]
pub enum FileCommands {
    /// List a directory inside the sandbox
    Ls {
        /// Server id
        id: String,

        /// Directory, relative to the working directory
        #[arg(default_value = "")]
        path: String,
    },

    /// Print a file inside the sandbox
    Cat {
        /// Server id
        id: String,

        /// File, relative to the working directory
        path: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ActionArg {
    Restart,
    Update,
    Backup,
}

impl From<ActionArg> for ScheduleAction {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Restart => ScheduleAction::Restart,
            ActionArg::Update => ScheduleAction::Update,
            ActionArg::Backup => ScheduleAction::Backup,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum UnitArg {
    Hours,
    Days,
}

impl From<UnitArg> for ScheduleUnit {
    fn from(arg: UnitArg) -> Self {
        match arg {
            UnitArg::Hours => ScheduleUnit::Hours,
            UnitArg::Days => ScheduleUnit::Days,
        }
    }
}
