//! # dosely
//!
//! Command-line shell for Dosely. Each subcommand plays the part of one
//! screen: `list` is the stock grid, `show` the stock detail page, `login`
//! and `signup` the public forms.
//!
//! ## Module Organization
//! ```text
//! dosely/
//! ├── main.rs         ◄─── You are here (argument parsing, tracing, exit codes)
//! ├── commands.rs     ◄─── Wiring and one handler per subcommand
//! └── render.rs       ◄─── Plain-text rendering of the view models
//! ```
//!
//! ## Routing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  login / signup / google-login / status / logout / init   (public)     │
//! │  everything else                                          (protected)  │
//! │                                                                         │
//! │  protected + no token ──────────────┐                                   │
//! │  401 from the server (token cleared)├──► "please log in" hint, exit 2   │
//! │  session Expired after the command ─┘                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod commands;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use dosely_client::ClientError;
use dosely_core::validation::MedicineForm;
use dosely_core::{MedicineId, StockId};
use tracing_subscriber::EnvFilter;

/// Printed whenever the user has to sign in (again).
const LOGIN_HINT: &str = "You are not signed in or your session has expired. Run `dosely login` to continue.";

/// Exit code for the login redirect.
const EXIT_LOGIN_REQUIRED: u8 = 2;

// =============================================================================
// Command Line
// =============================================================================

#[derive(Parser, Debug)]
#[command(name = "dosely", author, version, about = "Keep track of your medicine stocks")]
pub struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign in with a Google ID token
    GoogleLogin {
        id_token: String,
    },
    /// Forget the stored session token
    Logout,
    /// Show the API address and session state
    Status,
    /// Write the current settings to the config file
    Init,
    /// List your stocks
    List {
        /// Keep loading pages until every stock is shown
        #[arg(long)]
        all: bool,
        /// Only show stocks whose name contains this text
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Create a stock
    Create {
        name: String,
    },
    /// Rename a stock
    Rename {
        id: StockId,
        name: String,
    },
    /// Delete a stock
    Delete {
        id: StockId,
    },
    /// Show a stock with its medicines grouped by time of day
    Show {
        id: StockId,
    },
    /// Add a medicine to a stock
    AddMed {
        stock_id: StockId,
        #[command(flatten)]
        medicine: MedicineArgs,
    },
    /// Change a medicine; omitted flags keep their current value
    EditMed {
        stock_id: StockId,
        med_id: MedicineId,
        #[command(flatten)]
        changes: MedicineChanges,
    },
    /// Remove a medicine from a stock
    DeleteMed {
        stock_id: StockId,
        med_id: MedicineId,
    },
}

impl Command {
    /// Commands that work without a session.
    pub fn is_public(&self) -> bool {
        matches!(
            self,
            Command::Login { .. }
                | Command::Signup { .. }
                | Command::GoogleLogin { .. }
                | Command::Logout
                | Command::Status
                | Command::Init
        )
    }
}

/// The add-medicine form. Numbers are taken as typed.
#[derive(Args, Debug)]
pub struct MedicineArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub dose: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub quantity: String,
    #[arg(long)]
    pub morning: bool,
    #[arg(long)]
    pub afternoon: bool,
    #[arg(long)]
    pub evening: bool,
}

impl From<MedicineArgs> for MedicineForm {
    fn from(args: MedicineArgs) -> Self {
        MedicineForm {
            name: args.name,
            dose: args.dose,
            quantity: args.quantity,
            take_morning: args.morning,
            take_afternoon: args.afternoon,
            take_evening: args.evening,
        }
    }
}

/// The edit-medicine form, applied over the current values.
#[derive(Args, Debug)]
pub struct MedicineChanges {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    pub dose: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    pub quantity: Option<String>,
    #[arg(long)]
    pub morning: Option<bool>,
    #[arg(long)]
    pub afternoon: Option<bool>,
    #[arg(long)]
    pub evening: Option<bool>,
}

impl MedicineChanges {
    pub fn apply(self, form: &mut MedicineForm) {
        if let Some(name) = self.name {
            form.name = name;
        }
        if let Some(dose) = self.dose {
            form.dose = dose;
        }
        if let Some(quantity) = self.quantity {
            form.quantity = quantity;
        }
        if let Some(morning) = self.morning {
            form.take_morning = morning;
        }
        if let Some(afternoon) = self.afternoon {
            form.take_afternoon = afternoon;
        }
        if let Some(evening) = self.evening {
            form.take_evening = evening;
        }
    }
}

// =============================================================================
// Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

/// Initialize tracing subscriber for logging. Logs go to stderr so command
/// output on stdout stays clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dosely=debug,reqwest=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Maps a failed command to a message and an exit code.
fn report(err: &anyhow::Error) -> ExitCode {
    if let Some(client) = err.downcast_ref::<ClientError>() {
        if client.is_auth_invalid() {
            eprintln!("{}", LOGIN_HINT);
            return ExitCode::from(EXIT_LOGIN_REQUIRED);
        }
        if client.is_retryable() {
            eprintln!("error: {:#}. Try again in a moment.", err);
            return ExitCode::FAILURE;
        }
    }
    eprintln!("error: {:#}", err);
    ExitCode::FAILURE
}
