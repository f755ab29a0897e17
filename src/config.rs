use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};

use crate::{
    auth::TokenKeys,
    core::db::{Priority, Role, Status},
};

pub const DEFAULT_BOARD_FILE: &str = "taskboard.board";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Parser, Debug)]
#[command(name = "taskboard")]
#[command(about = "Track projects, scenarios and tasks", version)]
pub struct Cli {
    /// Board file to work on
    #[arg(long, env = "TASKBOARD_BOARD", value_name = "FILE", conflicts_with = "remote")]
    pub board: Option<PathBuf>,

    /// URL of a running `taskboard serve` to work against instead of a board file
    #[arg(long, env = "TASKBOARD_REMOTE", value_name = "URL")]
    pub remote: Option<String>,

    /// Secret used to sign access tokens
    #[arg(
        long,
        env = "TOKEN_SECRET",
        default_value = "taskboard-token-secret",
        hide_env_values = true
    )]
    pub token_secret: String,

    /// Secret used to sign refresh tokens
    #[arg(
        long,
        env = "REFRESH_TOKEN_SECRET",
        default_value = "taskboard-refresh-token-secret",
        hide_env_values = true
    )]
    pub refresh_token_secret: String,

    /// Answer yes to every confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn board_file(&self) -> PathBuf {
        self.board
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BOARD_FILE))
    }

    pub fn token_keys(&self) -> TokenKeys {
        TokenKeys::new(&self.token_secret, &self.refresh_token_secret)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the board over HTTP
    Serve(ServeArgs),
    /// Log in and remember the session
    Login { username: String, password: String },
    /// Show the logged in user and the current selection
    Whoami,
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Manage scenarios of the selected project
    #[command(subcommand)]
    Scenario(ScenarioCommand),
    /// Manage tasks of the selected scenario
    #[command(subcommand)]
    Task(TaskCommand),
    /// Create the default accounts on a board without users
    Seed,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(short, long, env = "TASKBOARD_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Require a bearer token on every data route
    #[arg(long, env = "TASKBOARD_REQUIRE_AUTH")]
    pub require_auth: bool,

    /// Save the board every N seconds (0 disables)
    #[arg(long, env = "TASKBOARD_AUTOSAVE_SECS", default_value_t = 60)]
    pub autosave_secs: u64,
}

impl ServeArgs {
    pub fn autosave_period(&self) -> Option<Duration> {
        (self.autosave_secs > 0).then(|| Duration::from_secs(self.autosave_secs))
    }
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    List,
    Add {
        username: String,
        name: String,
        surname: String,
        #[arg(long, default_value = "developer")]
        role: Role,
        #[arg(long)]
        password: String,
    },
    /// List users that can own tasks
    Assignable,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    List,
    Add {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a project with all its scenarios and tasks
    Rm { id: i64 },
    Select { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum ScenarioCommand {
    List {
        /// Defaults to the selected project
        #[arg(long)]
        project: Option<i64>,
    },
    Add {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long, default_value = "medium")]
        priority: Priority,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        priority: Option<Priority>,
    },
    /// Delete a scenario with all its tasks
    Rm { id: i64 },
    Select { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    List {
        /// Defaults to the selected scenario
        #[arg(long)]
        scenario: Option<i64>,
        #[arg(short, long)]
        status: Option<Status>,
    },
    Kanban {
        #[arg(long)]
        scenario: Option<i64>,
    },
    Show {
        /// Defaults to the selected task
        id: Option<i64>,
    },
    Add {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long, default_value = "medium")]
        priority: Priority,
        /// Estimate in hours
        #[arg(short, long, default_value_t = 0.0)]
        estimate: f64,
        /// User id of the owner
        #[arg(short, long)]
        owner: Option<i64>,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        priority: Option<Priority>,
        #[arg(short, long)]
        estimate: Option<f64>,
    },
    Rm { id: i64 },
    Select { id: i64 },
    /// Move a task to another status
    Status {
        status: Status,
        /// Defaults to the selected task
        #[arg(long)]
        task: Option<i64>,
    },
    /// Give a task to a user
    Assign {
        owner: i64,
        #[arg(long)]
        task: Option<i64>,
    },
}
