//! Subcommand handlers.
//!
//! [`Shell`] builds the client stack once per invocation:
//!
//! ```text
//! ClientConfig ──► FileTokenStorage ──► SessionStore ──► HttpApi
//!                                                          │
//!                               ┌──────────────────────────┴──────────┐
//!                               ▼                                     ▼
//!                     StockListSynchronizer                     StockEditor
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use dosely_client::{
    AuthApi, AuthState, ClientConfig, ClientError, FileTokenStorage, HttpApi, ListEventEmitter,
    SessionStore, StockEditor, StockListSynchronizer,
};
use dosely_core::validation::{validate_credentials, validate_signup, MedicineForm};
use dosely_core::{AuthResponse, CoreError, MedicineId, StockId, ValidationError};
use tracing::{debug, info, warn};

use crate::{render, Cli, Command, MedicineArgs, MedicineChanges};

type StockList = StockListSynchronizer<HttpApi>;

// =============================================================================
// Event Emitter
// =============================================================================

/// Reports list progress to the log.
struct LogEmitter;

impl ListEventEmitter for LogEmitter {
    fn on_loaded(&self, loaded: usize, total: usize, has_more: bool) {
        debug!(loaded, total, has_more, "Stock list updated");
    }

    fn on_error(&self, message: &str, retryable: bool) {
        warn!(retryable, "Stock list error: {}", message);
    }
}

// =============================================================================
// Shell
// =============================================================================

/// Everything a command needs, built from the config.
pub struct Shell {
    config: ClientConfig,
    config_path: Option<PathBuf>,
    session: Arc<SessionStore>,
    api: Arc<HttpApi>,
}

impl Shell {
    pub fn open(config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = ClientConfig::load(config_path.clone()).context("failed to load config")?;

        let session_path = config
            .session
            .resolved_storage_path()
            .ok_or_else(|| anyhow!("no data directory for the session file, set DOSELY_SESSION_PATH"))?;
        debug!(path = ?session_path, "Opening session store");

        let storage = Arc::new(FileTokenStorage::new(session_path));
        let session = Arc::new(SessionStore::open(storage, config.session.token_key.clone())?);
        Self::with_session(config, config_path, session)
    }

    /// Builds the shell around an already opened session.
    pub fn with_session(
        config: ClientConfig,
        config_path: Option<PathBuf>,
        session: Arc<SessionStore>,
    ) -> anyhow::Result<Self> {
        let api = Arc::new(HttpApi::new(&config, Arc::clone(&session))?);
        Ok(Self {
            config,
            config_path,
            session,
            api,
        })
    }

    fn list(&self) -> Arc<StockList> {
        Arc::new(StockListSynchronizer::with_emitter(
            Arc::clone(&self.api),
            self.config.page_size(),
            Arc::new(LogEmitter),
        ))
    }

    fn sign_in(&self, response: AuthResponse) -> anyhow::Result<()> {
        self.session.login(&response.token)?;
        match response.user {
            Some(user) => println!("Signed in as {} <{}>", user.name, user.email),
            None => println!("Signed in"),
        }
        Ok(())
    }

    async fn open_editor(&self, stock_id: StockId) -> anyhow::Result<StockEditor<HttpApi>> {
        Ok(StockEditor::open(Arc::clone(&self.api), stock_id).await?)
    }
}

// =============================================================================
// Dispatch
// =============================================================================

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let shell = Shell::open(cli.config)?;
    execute(&shell, cli.command).await
}

/// Runs one command, applying the protected-route check first.
pub async fn execute(shell: &Shell, command: Command) -> anyhow::Result<()> {
    if !command.is_public() && !shell.session.is_authenticated() {
        return Err(ClientError::NotAuthenticated.into());
    }

    let result = dispatch(shell, command).await;

    // A 401 on any call clears the session; send the user to login even if
    // the command itself swallowed the error.
    if shell.session.state() == AuthState::Expired {
        info!("Session expired during command");
        return Err(ClientError::AuthInvalid.into());
    }
    result
}

async fn dispatch(shell: &Shell, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => {
            let credentials = validate_credentials(&email, &password)?;
            let response = shell.api.login(&credentials).await?;
            shell.sign_in(response)
        }
        Command::Signup {
            name,
            email,
            password,
        } => {
            let request = validate_signup(&name, &email, &password)?;
            let response = shell.api.signup(&request).await?;
            shell.sign_in(response)
        }
        Command::GoogleLogin { id_token } => {
            if id_token.trim().is_empty() {
                return Err(ValidationError::Required {
                    field: "token".into(),
                }
                .into());
            }
            let response = shell.api.google_login(id_token.trim()).await?;
            shell.sign_in(response)
        }
        Command::Logout => {
            shell.session.logout()?;
            println!("Signed out");
            Ok(())
        }
        Command::Status => status(shell),
        Command::Init => init(shell),
        Command::List { all, search } => list(shell, all, &search).await,
        Command::Create { name } => {
            let list = shell.list();
            let stock = list.create(&name).await?;
            println!("Created stock #{} \"{}\"", stock.id, stock.name);
            Ok(())
        }
        Command::Rename { id, name } => {
            let list = shell.list();
            let stock = list.rename(id, &name).await?;
            println!("Renamed stock #{} to \"{}\"", stock.id, stock.name);
            Ok(())
        }
        Command::Delete { id } => delete(shell, id).await,
        Command::Show { id } => {
            let editor = shell.open_editor(id).await?;
            print!("{}", render::stock_detail(editor.stock(), &editor.schedule()));
            Ok(())
        }
        Command::AddMed { stock_id, medicine } => add_medicine(shell, stock_id, medicine).await,
        Command::EditMed {
            stock_id,
            med_id,
            changes,
        } => edit_medicine(shell, stock_id, med_id, changes).await,
        Command::DeleteMed { stock_id, med_id } => {
            let mut editor = shell.open_editor(stock_id).await?;
            let removed = editor.delete_medicine(med_id).await?;
            println!("Removed \"{}\" from \"{}\"", removed.name, editor.stock().name);
            Ok(())
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn status(shell: &Shell) -> anyhow::Result<()> {
    let config_path = shell
        .config_path
        .clone()
        .or_else(ClientConfig::default_config_path);
    print!(
        "{}",
        render::status(
            shell.config.base_url(),
            config_path.as_deref(),
            shell.session.state()
        )
    );
    Ok(())
}

fn init(shell: &Shell) -> anyhow::Result<()> {
    shell
        .config
        .save(shell.config_path.clone())
        .context("failed to write config")?;
    println!("Config written");
    Ok(())
}

async fn list(shell: &Shell, all: bool, search: &str) -> anyhow::Result<()> {
    let list = shell.list();
    list.reset_and_load_first_page().await?;
    if all {
        while list.on_sentinel_visible().await? {}
    }
    print!("{}", render::stock_list(&list.view(search)));
    list.teardown();
    Ok(())
}

/// Pages through the list until `id` is held, then deletes it optimistically.
async fn delete(shell: &Shell, id: StockId) -> anyhow::Result<()> {
    let list = shell.list();
    list.reset_and_load_first_page().await?;
    while !list.stocks().iter().any(|s| s.id == id) {
        if !list.load_next_page().await? {
            break;
        }
    }

    let name = list
        .stocks()
        .into_iter()
        .find(|s| s.id == id)
        .map(|s| s.name)
        .ok_or(CoreError::StockNotFound(id))?;
    list.delete(id).await?;
    println!("Deleted stock #{} \"{}\"", id, name);
    Ok(())
}

async fn add_medicine(shell: &Shell, stock_id: StockId, args: MedicineArgs) -> anyhow::Result<()> {
    let mut editor = shell.open_editor(stock_id).await?;
    match editor.add_medicine(MedicineForm::from(args)).await? {
        Some(medicine) => println!(
            "Added \"{}\" (#{}) to \"{}\"",
            medicine.name,
            medicine.id,
            editor.stock().name
        ),
        None => println!("Medicine added to \"{}\"", editor.stock().name),
    }
    Ok(())
}

async fn edit_medicine(
    shell: &Shell,
    stock_id: StockId,
    med_id: MedicineId,
    changes: MedicineChanges,
) -> anyhow::Result<()> {
    let mut editor = shell.open_editor(stock_id).await?;
    let current = editor
        .stock()
        .find_medicine(med_id)
        .ok_or(CoreError::MedicineNotFound {
            stock_id,
            medicine_id: med_id,
        })?;

    let mut form = MedicineForm::from_medicine(current);
    changes.apply(&mut form);
    let updated = editor.edit_medicine(med_id, form).await?;
    println!(
        "Updated \"{}\": dose {}, quantity {}",
        updated.name, updated.dose, updated.quantity
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use dosely_client::{MemoryTokenStorage, TokenStorage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn shell(base_url: &str, storage: Arc<MemoryTokenStorage>) -> Shell {
        let mut config = ClientConfig::default();
        config.api.base_url = base_url.to_string();
        let session = Arc::new(SessionStore::open(storage, "dosely_token").unwrap());
        Shell::with_session(config, None, session).unwrap()
    }

    fn list_command() -> Command {
        Command::List {
            all: false,
            search: String::new(),
        }
    }

    fn client_error(err: &anyhow::Error) -> &ClientError {
        err.downcast_ref::<ClientError>().expect("client error")
    }

    #[tokio::test]
    async fn test_protected_command_without_session_sends_nothing() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new().route(
            "/stock/getAll",
            get({
                let hits = hits.clone();
                move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                    async { "[]" }
                }
            }),
        );
        let base = serve(router).await;
        let shell = shell(&base, Arc::new(MemoryTokenStorage::new()));

        let err = execute(&shell, list_command()).await.unwrap_err();
        assert!(matches!(client_error(&err), ClientError::NotAuthenticated));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(crate::report(&err), std::process::ExitCode::from(2));
    }

    #[tokio::test]
    async fn test_public_command_without_session() {
        let shell = shell("http://localhost:3000", Arc::new(MemoryTokenStorage::new()));
        execute(&shell, Command::Status).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_token_routes_to_login() {
        let router = Router::new().route(
            "/stock/getAll",
            get(|| async { (StatusCode::UNAUTHORIZED, "jwt expired") }),
        );
        let base = serve(router).await;
        let storage = Arc::new(MemoryTokenStorage::new());
        storage.store("dosely_token", "stale-token").unwrap();
        let shell = shell(&base, storage.clone());
        assert!(shell.session.is_authenticated());

        let err = execute(&shell, list_command()).await.unwrap_err();
        assert!(client_error(&err).is_auth_invalid());
        assert_eq!(shell.session.state(), AuthState::Expired);
        assert!(storage.load("dosely_token").unwrap().is_none());
        assert_eq!(crate::report(&err), std::process::ExitCode::from(2));
    }
}
