use anyhow::{Context as _, bail};
use api_client::{HttpClient, PlatformApi};
use clap::{Parser, Subcommand, ValueEnum};
use configuration::{ApiEnvironment, Settings};
use controller::{
    AccountStore, AdminDirectory, BacktestRunner, Composer, ControllerError, Copilot, CopilotEvent,
    CopilotSession, Key, LifecycleController, Notice, Poller,
};
use core_types::{Llm, TradingMode, View};
use indicatif::{ProgressBar, ProgressStyle};
use session::{AuthClient, PersistentSession, RouteDecision, Session, SessionError, SessionProvider, SessionStore, guard};
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

mod render;

/// The main entry point for the Richacle console.
#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; settings have defaults.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = configuration::telemetry::init_tracing(&settings.logging);
    tracing::debug!(api = %settings.api.resolved_base_url(), "Configuration loaded.");

    match run(cli, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(err) = e.downcast_ref::<ControllerError>() {
                render::print_notice(&err.notice());
            } else {
                tracing::error!(error = %format!("{e:#}"), "Command failed.");
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Console client for the Richacle AI trading platform.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file to read.
    #[arg(long, global = true, default_value = configuration::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Platform preset to talk to, overriding the configured one.
    #[arg(long = "env", global = true, value_enum)]
    environment: Option<ApiEnvironment>,

    /// Explicit API base URL. Wins over any preset.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Print JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password.
    Login(LoginArgs),
    /// Forget the stored session.
    Logout,
    /// Show who is signed in.
    Whoami,
    /// Account flags, P&L and deployed strategies.
    Dashboard {
        /// Keep refreshing until interrupted.
        #[arg(long)]
        watch: bool,
    },
    /// Switch the trading terminal.
    Terminal {
        #[arg(value_enum)]
        state: Switch,
    },
    /// Switch the trading engine. The terminal must be on.
    Engine {
        #[arg(value_enum)]
        state: Switch,
    },
    /// Manage the Binance connection.
    #[command(subcommand)]
    Broker(BrokerCommand),
    /// Create, edit and inspect strategies.
    #[command(subcommand)]
    Strategy(StrategyCommand),
    /// Deploy a strategy.
    Deploy {
        id: String,
        /// LIVE or PAPER. Defaults to the strategy's stored mode.
        #[arg(long)]
        mode: Option<TradingMode>,
    },
    /// Stop a running strategy.
    Stop { id: String },
    /// Square off a strategy's position and stop it.
    SquareOff { id: String },
    /// Backtest a strategy's generated code.
    Backtest { id: String },
    /// Write a strategy description interactively with copilot suggestions.
    Compose {
        /// Regenerate this strategy instead of creating a new one.
        #[arg(long)]
        edit: Option<String>,
    },
    /// Administration.
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Parser)]
struct LoginArgs {
    #[arg(long)]
    email: Option<String>,
    /// Read from RICHACLE_PASSWORD when not given; prompted for otherwise.
    #[arg(long, env = "RICHACLE_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Switch {
    On,
    Off,
}

impl Switch {
    fn is_on(self) -> bool {
        self == Switch::On
    }
}

#[derive(Subcommand)]
enum BrokerCommand {
    /// Save a Binance API key pair on the account.
    Connect {
        #[arg(long, env = "RICHACLE_BINANCE_API_KEY", hide_env_values = true)]
        api_key: String,
        #[arg(long, env = "RICHACLE_BINANCE_API_SECRET", hide_env_values = true)]
        api_secret: String,
    },
}

#[derive(Subcommand)]
enum StrategyCommand {
    /// List every strategy on the account.
    List,
    /// Generate a strategy from a description.
    Create {
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,
    },
    /// Regenerate a strategy from a new description.
    Edit {
        id: String,
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,
    },
    /// Choose the LLM that generates a strategy.
    Llm { id: String, llm: Llm },
}

#[derive(Subcommand)]
enum AdminCommand {
    /// List all users.
    Users {
        /// Case-insensitive filter on email or id.
        #[arg(long, default_value = "")]
        query: String,
    },
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = configuration::load_settings_from(&cli.config)
        .with_context(|| format!("reading {}", cli.config.display()))?;
    if let Some(environment) = cli.environment {
        settings.api.environment = environment;
        settings.api.base_url = None;
    }
    if let Some(url) = &cli.api_url {
        settings.api.base_url = Some(url.clone());
    }
    settings.validate()?;
    Ok(settings)
}

// ==============================================================================
// Application Context
// ==============================================================================

struct Context {
    settings: Settings,
    session: PersistentSession,
    json: bool,
}

impl Context {
    fn new(settings: Settings, json: bool) -> Self {
        let store = SessionStore::new(settings.auth.session_path());
        let auth = match AuthClient::new(&settings.auth) {
            Ok(auth) => Some(auth),
            Err(SessionError::NotConfigured) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Identity provider unavailable.");
                None
            }
        };
        Self {
            session: PersistentSession::new(store, auth),
            settings,
            json,
        }
    }

    /// The session for a guarded view, or the reason it cannot be shown.
    async fn require(&self, view: View) -> anyhow::Result<Session> {
        let current = self.session.current().await?;
        match (guard(view, current.is_some()), current) {
            (RouteDecision::Allow, Some(session)) => Ok(session),
            _ => Err(ControllerError::NotSignedIn.into()),
        }
    }

    fn api(&self, session: &Session) -> anyhow::Result<Arc<dyn PlatformApi>> {
        let client = HttpClient::with_access_token(&self.settings.api, &session.access_token)?;
        Ok(Arc::new(client))
    }

    /// A freshly loaded account store for the signed-in user.
    async fn account(&self, view: View) -> anyhow::Result<Arc<AccountStore>> {
        let session = self.require(view).await?;
        let store = Arc::new(AccountStore::new(self.api(&session)?, session.email));
        store.refresh().await?;
        Ok(store)
    }

    async fn lifecycle(&self, view: View) -> anyhow::Result<LifecycleController> {
        Ok(LifecycleController::new(self.account(view).await?))
    }

    fn print_json<T: serde::Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

async fn run(cli: Cli, settings: Settings) -> anyhow::Result<()> {
    let ctx = Context::new(settings, cli.json);
    match cli.command {
        Commands::Login(args) => handle_login(&ctx, args).await,
        Commands::Logout => {
            let email = ctx.session.current_email().await.ok().flatten();
            ctx.session.sign_out().await?;
            let message = match email {
                Some(email) => format!("Signed out {email}"),
                None => "Signed out".to_string(),
            };
            render::print_notice(&Notice::success(message).with_redirect(Some(View::Login)));
            Ok(())
        }
        Commands::Whoami => handle_whoami(&ctx).await,
        Commands::Dashboard { watch } => handle_dashboard(&ctx, watch).await,
        Commands::Terminal { state } => handle_switch(&ctx, SwitchTarget::Terminal, state).await,
        Commands::Engine { state } => handle_switch(&ctx, SwitchTarget::Engine, state).await,
        Commands::Broker(BrokerCommand::Connect { api_key, api_secret }) => {
            let lifecycle = ctx.lifecycle(View::Dashboard).await?;
            render::print_notice(&lifecycle.connect_broker(&api_key, &api_secret).await?);
            Ok(())
        }
        Commands::Strategy(command) => handle_strategy(&ctx, command).await,
        Commands::Deploy { id, mode } => {
            let lifecycle = ctx.lifecycle(View::Strategy).await?;
            render::print_notice(&lifecycle.deploy(&id, mode).await?);
            Ok(())
        }
        Commands::Stop { id } => {
            let lifecycle = ctx.lifecycle(View::Dashboard).await?;
            render::print_notice(&lifecycle.stop(&id).await?);
            Ok(())
        }
        Commands::SquareOff { id } => {
            let lifecycle = ctx.lifecycle(View::Dashboard).await?;
            render::print_notice(&lifecycle.square_off(&id).await?);
            Ok(())
        }
        Commands::Backtest { id } => handle_backtest(&ctx, &id).await,
        Commands::Compose { edit } => handle_compose(&ctx, edit).await,
        Commands::Admin(AdminCommand::Users { query }) => handle_admin_users(&ctx, &query).await,
    }
}

// ==============================================================================
// Command Handlers
// ==============================================================================

async fn handle_login(ctx: &Context, args: LoginArgs) -> anyhow::Result<()> {
    let current = ctx.session.current().await?;
    if let (RouteDecision::Redirect(target), Some(session)) = (guard(View::Login, current.is_some()), &current) {
        render::print_notice(
            &Notice::info(format!("Already signed in as {}", session.email)).with_redirect(Some(target)),
        );
        return Ok(());
    }

    let email = match args.email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = match args.password {
        Some(password) => password,
        None => prompt("Password: ")?,
    };
    if email.trim().is_empty() || password.is_empty() {
        bail!("Email and password are both required");
    }

    let session = ctx.session.sign_in(email.trim(), &password).await?;
    let store = Arc::new(AccountStore::new(ctx.api(&session)?, session.email.clone()));
    if let Err(e) = LifecycleController::new(store).register_user().await {
        tracing::warn!(error = %e, "Failed to register the account record.");
    }

    render::print_notice(
        &Notice::success(format!("Signed in as {}", session.email)).with_redirect(Some(View::Dashboard)),
    );
    Ok(())
}

async fn handle_whoami(ctx: &Context) -> anyhow::Result<()> {
    match ctx.session.current().await? {
        Some(session) if ctx.json => ctx.print_json(&serde_json::json!({
            "email": session.email,
            "expires_at": session.expires_at.to_rfc3339(),
            "api": ctx.settings.api.resolved_base_url(),
        })),
        Some(session) => {
            println!("{} (session valid until {})", session.email, session.expires_at.to_rfc3339());
            println!("API: {}", ctx.settings.api.resolved_base_url());
            Ok(())
        }
        None => {
            render::print_notice(&Notice::info("Not signed in").with_redirect(Some(View::Login)));
            Ok(())
        }
    }
}

async fn handle_dashboard(ctx: &Context, watch: bool) -> anyhow::Result<()> {
    let store = ctx.account(View::Dashboard).await?;
    print_dashboard(ctx, &store).await?;
    if !watch {
        return Ok(());
    }

    let poller = Poller::spawn(store.clone(), ctx.settings.client.poll_interval());
    let mut revisions = store.subscribe();
    revisions.mark_unchanged();
    loop {
        tokio::select! {
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                print_dashboard(ctx, &store).await?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    poller.shutdown().await;
    Ok(())
}

async fn print_dashboard(ctx: &Context, store: &AccountStore) -> anyhow::Result<()> {
    let user = store.snapshot().await;
    if ctx.json {
        return ctx.print_json(&user);
    }
    println!("{}", render::dashboard(&user));
    Ok(())
}

enum SwitchTarget {
    Terminal,
    Engine,
}

async fn handle_switch(ctx: &Context, target: SwitchTarget, state: Switch) -> anyhow::Result<()> {
    let lifecycle = ctx.lifecycle(View::Dashboard).await?;
    let user = lifecycle.store().snapshot().await;
    let (name, current) = match target {
        SwitchTarget::Terminal => ("Terminal", user.terminal),
        SwitchTarget::Engine => ("Engine", user.engine),
    };
    if current == state.is_on() {
        render::print_notice(&Notice::info(format!(
            "{name} is already {}",
            if current { "ON" } else { "OFF" }
        )));
        return Ok(());
    }

    let notice = match target {
        SwitchTarget::Terminal => lifecycle.toggle_terminal().await?,
        SwitchTarget::Engine => lifecycle.toggle_engine().await?,
    };
    render::print_notice(&notice);
    Ok(())
}

async fn handle_strategy(ctx: &Context, command: StrategyCommand) -> anyhow::Result<()> {
    let lifecycle = ctx.lifecycle(View::Strategy).await?;
    match command {
        StrategyCommand::List => {
            let user = lifecycle.store().snapshot().await;
            if ctx.json {
                return ctx.print_json(&user.strategies);
            }
            println!("{}", render::strategies(&user));
        }
        StrategyCommand::Create { description } => {
            let notice = lifecycle.submit_strategy(&description.join(" "), None).await?;
            render::print_notice(&notice);
        }
        StrategyCommand::Edit { id, description } => {
            let notice = lifecycle.submit_strategy(&description.join(" "), Some(&id)).await?;
            render::print_notice(&notice);
        }
        StrategyCommand::Llm { id, llm } => {
            render::print_notice(&lifecycle.update_llm(&id, llm).await?);
        }
    }
    Ok(())
}

async fn handle_backtest(ctx: &Context, id: &str) -> anyhow::Result<()> {
    let runner = BacktestRunner::new(ctx.account(View::Backtest).await?);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    spinner.set_message(format!("Backtesting {id}..."));
    spinner.enable_steady_tick(Duration::from_millis(120));
    let result = runner.run(id).await;
    spinner.finish_and_clear();
    let report = result?;

    if ctx.json {
        return ctx.print_json(&serde_json::json!({
            "strategy_id": report.strategy_id,
            "metrics": report.metrics,
            "data_info": report.data_info,
            "trade_history": report.trade_history,
            "equity_curve": report.equity_curve,
        }));
    }
    println!("{}", render::backtest(&report));
    Ok(())
}

async fn handle_admin_users(ctx: &Context, query: &str) -> anyhow::Result<()> {
    let session = ctx.require(View::Admin).await?;
    let mut directory = AdminDirectory::new(ctx.api(&session)?);
    directory.load().await?;
    let found = directory.filter(query);
    if ctx.json {
        return ctx.print_json(&found);
    }
    println!("{}", render::users(&found));
    Ok(())
}

const COMPOSE_HELP: &str = "Type to describe your strategy; each line is appended.\n\
    Enter on an empty line accepts the suggestion.\n\
    Commands: :copilot on|off  :clear  :show  :submit  :quit";

async fn handle_compose(ctx: &Context, editing: Option<String>) -> anyhow::Result<()> {
    let lifecycle = ctx.lifecycle(View::Strategy).await?;
    let store = lifecycle.store().clone();

    let mut composer = Composer::new(ctx.settings.client.autocomplete_min_chars);
    if let Some(id) = &editing {
        let strategy = store
            .strategy(id)
            .await
            .ok_or_else(|| ControllerError::StrategyNotFound(id.clone()))?;
        composer.set_input(strategy.input);
    }
    let copilot = Copilot::new(
        store.api().clone(),
        store.email(),
        ctx.settings.client.autocomplete_debounce(),
    );
    let (mut session, mut events) = CopilotSession::new(composer, copilot);

    println!("{COMPOSE_HELP}");
    if let Some(id) = &editing {
        println!("Editing {id}: {}", session.snapshot().await.input());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    ":quit" => break,
                    ":show" => println!("{}", session.snapshot().await.input()),
                    ":clear" => session.edit("").await,
                    ":copilot on" => {
                        session.set_copilot(true).await;
                        println!("Copilot on");
                    }
                    ":copilot off" => {
                        session.set_copilot(false).await;
                        println!("Copilot off");
                    }
                    ":submit" => {
                        let input = session.snapshot().await.input().to_string();
                        match lifecycle.submit_strategy(&input, editing.as_deref()).await {
                            Ok(notice) => {
                                render::print_notice(&notice);
                                break;
                            }
                            Err(e) => render::print_notice(&e.notice()),
                        }
                    }
                    "" => {
                        if session.handle_key(Key::Tab).await {
                            println!("{}", session.snapshot().await.input());
                        }
                    }
                    text => {
                        let current = session.snapshot().await.input().to_string();
                        let next = if current.trim().is_empty() {
                            text.to_string()
                        } else {
                            format!("{} {text}", current.trim_end())
                        };
                        session.edit(next).await;
                    }
                }
            }
            Some(event) = events.recv() => match event {
                CopilotEvent::Suggested(suggestion) => println!("  ⇥ {}  (Enter to accept)", suggestion.trim()),
                CopilotEvent::Disabled(notice) => render::print_notice(&notice),
                CopilotEvent::Failed(reason) => tracing::debug!(reason = %reason, "No suggestion."),
            },
        }
    }
    Ok(())
}

fn prompt(label: &str) -> anyhow::Result<String> {
    let mut out = std::io::stdout();
    out.write_all(label.as_bytes())?;
    out.flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_deploy_with_a_mode() {
        let cli = Cli::try_parse_from(["richacle", "deploy", "s1", "--mode", "paper"]).unwrap();
        match cli.command {
            Commands::Deploy { id, mode } => {
                assert_eq!(id, "s1");
                assert_eq!(mode, Some(TradingMode::Paper));
            }
            _ => panic!("expected deploy"),
        }
    }

    #[test]
    fn api_url_flag_overrides_the_preset() {
        let cli = Cli::try_parse_from([
            "richacle",
            "--config",
            "does-not-exist.toml",
            "--env",
            "local",
            "--api-url",
            "https://staging.example.com",
            "whoami",
        ])
        .unwrap();
        let settings = load_settings(&cli).unwrap();
        assert_eq!(settings.api.environment, ApiEnvironment::Local);
        assert_eq!(settings.api.resolved_base_url(), "https://staging.example.com");
    }
}
