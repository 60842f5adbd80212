//! CLI binary for konverta.
//!
//! A thin presentation layer over the library crate: it keeps profiles,
//! session, conversion records, and subscription orders in a JSON state file
//! (the CLI's stand-in for the product's hosted tables) and maps subcommands
//! to workflow operations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use konverta::{
    conversion_targets, ArchiveStore, Catalog, ConfirmOutcome, ConversionRecord,
    ConversionWorkflow, EngineError, FixedDelayConverter, FormatKey, PlanOutcome, Principal,
    ProfileStore, QuotaLedger, SubmitOutcome, SubscriptionOrder, SubscriptionWorkflow,
    UserProfile,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Register and sign in
  konverta signup --email ani@example.com --password rahasia --name "Ani Wijaya"
  konverta login  --email ani@example.com --password rahasia

  # Convert a document (3 free conversions, then premium is required)
  konverta convert report.docx --to pdf

  # Check quota and history
  konverta status
  konverta history

  # Go premium via manual bank transfer
  konverta plans
  konverta subscribe --plan pro --channel bca
  konverta orders

STATE:
  All accounts, records, and orders live in a JSON state file
  (default: ./konverta-state.json, override with --state or KONVERTA_STATE).
  Delete the file to start over.

CATALOG:
  The built-in plan/channel catalog can be replaced with --catalog <FILE>
  (or KONVERTA_CATALOG). A malformed catalog aborts startup.
"#;

/// Convert documents between PDF, DOCX, PPTX, and XLSX with a freemium quota.
#[derive(Parser, Debug)]
#[command(
    name = "konverta",
    version,
    about = "Freemium document conversion with quota tracking and bank-transfer subscriptions",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path of the JSON state file.
    #[arg(long, env = "KONVERTA_STATE", default_value = "konverta-state.json", global = true)]
    state: PathBuf,

    /// Replace the built-in plan/channel catalog with a JSON file.
    #[arg(long, env = "KONVERTA_CATALOG", global = true)]
    catalog: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "KONVERTA_VERBOSE", global = true)]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, env = "KONVERTA_QUIET", global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new account and sign in.
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Full name shown on the profile.
        #[arg(long)]
        name: String,
    },
    /// Sign in to an existing account.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out of the current session.
    Logout,
    /// Show the signed-in account, premium status, and remaining quota.
    Status,
    /// List the supported formats and their conversion targets.
    Formats,
    /// Convert a document to another format.
    Convert {
        /// Input document (pdf, doc(x), ppt(x), xls(x)).
        file: PathBuf,
        /// Target format: pdf, docx, pptx, or xlsx.
        #[arg(long = "to")]
        to: String,
        /// Simulated conversion delay in milliseconds.
        #[arg(long, default_value_t = 2000)]
        delay_ms: u64,
    },
    /// List this account's conversion records.
    History,
    /// Show the subscription plans.
    Plans,
    /// Show the manual-transfer payment channels.
    Channels,
    /// Order a subscription plan via manual bank transfer.
    Subscribe {
        /// Plan id (see `konverta plans`).
        #[arg(long)]
        plan: String,
        /// Payment channel id (see `konverta channels`).
        #[arg(long)]
        channel: String,
    },
    /// List this account's subscription orders.
    Orders,
}

// ── JSON state file ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredUser {
    id: String,
    email: String,
    password_digest: String,
    profile: UserProfile,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StateFile {
    users: Vec<StoredUser>,
    /// Principal id of the signed-in user, if any.
    session: Option<String>,
    conversions: Vec<ConversionRecord>,
    orders: Vec<SubscriptionOrder>,
}

/// Profile store + archive backed by the JSON state file.
///
/// Every mutation rewrites the file before returning, so a conversion is
/// only reported successful once its record and the incremented counter are
/// actually on disk — the same confirmation rule the hosted stores follow.
struct FileStore {
    path: PathBuf,
    state: Mutex<StateFile>,
}

impl FileStore {
    fn load(path: &PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read state file {}", path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("State file {} is corrupt", path.display()))?
        } else {
            StateFile::default()
        };
        Ok(Self { path: path.clone(), state: Mutex::new(state) })
    }

    fn persist(&self, state: &StateFile) -> Result<(), EngineError> {
        let json = serde_json::to_string_pretty(state).map_err(|e| EngineError::Persistence {
            operation: "state serialisation",
            detail: e.to_string(),
        })?;
        std::fs::write(&self.path, json).map_err(|e| EngineError::Persistence {
            operation: "state file write",
            detail: e.to_string(),
        })
    }

    async fn current_principal(&self) -> Principal {
        let state = self.state.lock().await;
        match &state.session {
            Some(id) => Principal::authenticated(id.clone()),
            None => Principal::anonymous(),
        }
    }

    async fn current_user(&self) -> Option<StoredUser> {
        let state = self.state.lock().await;
        let id = state.session.clone()?;
        state.users.iter().find(|u| u.id == id).cloned()
    }

    async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<Principal> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
            bail!("an account already exists for '{email}'");
        }
        let id = Uuid::new_v4().to_string();
        state.users.push(StoredUser {
            id: id.clone(),
            email: email.to_string(),
            password_digest: digest(password),
            profile: UserProfile { full_name: name.to_string(), ..UserProfile::default() },
        });
        state.session = Some(id.clone());
        self.persist(&state)?;
        Ok(Principal::authenticated(id))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email) && u.password_digest == digest(password))
            .cloned();
        let Some(user) = user else { bail!("invalid email or password") };
        state.session = Some(user.id.clone());
        self.persist(&state)?;
        Ok(Principal::authenticated(user.id))
    }

    async fn sign_out(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.session = None;
        self.persist(&state)?;
        Ok(())
    }
}

fn digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

#[async_trait]
impl ProfileStore for FileStore {
    async fn profile(&self, principal_id: &str) -> Result<UserProfile, EngineError> {
        let state = self.state.lock().await;
        state
            .users
            .iter()
            .find(|u| u.id == principal_id)
            .map(|u| u.profile.clone())
            .ok_or_else(|| EngineError::UnknownPrincipal { id: principal_id.to_string() })
    }

    async fn increment_conversions(&self, principal_id: &str) -> Result<UserProfile, EngineError> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == principal_id)
            .ok_or_else(|| EngineError::UnknownPrincipal { id: principal_id.to_string() })?;
        user.profile.conversion_count += 1;
        let profile = user.profile.clone();
        self.persist(&state)?;
        Ok(profile)
    }
}

#[async_trait]
impl ArchiveStore for FileStore {
    async fn append_conversion(&self, record: ConversionRecord) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        state.conversions.push(record);
        self.persist(&state)
    }

    async fn append_order(&self, order: SubscriptionOrder) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        state.orders.push(order);
        self.persist(&state)
    }

    async fn conversions_for(
        &self,
        principal_id: &str,
    ) -> Result<Vec<ConversionRecord>, EngineError> {
        let state = self.state.lock().await;
        Ok(state
            .conversions
            .iter()
            .filter(|r| r.principal_id == principal_id)
            .cloned()
            .collect())
    }

    async fn orders_for(&self, principal_id: &str) -> Result<Vec<SubscriptionOrder>, EngineError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .filter(|o| o.principal_id == principal_id)
            .cloned()
            .collect())
    }
}

// ── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Malformed catalog data is startup-fatal; nothing below can run on it.
    let catalog = Arc::new(match &cli.catalog {
        Some(path) => Catalog::from_path(path).context("Invalid catalog file")?,
        None => Catalog::builtin(),
    });

    let store = Arc::new(FileStore::load(&cli.state)?);

    match cli.command {
        Command::Signup { email, password, name } => {
            let principal = store.sign_up(&email, &password, &name).await?;
            println!("{} Registered and signed in as {}", green("✔"), bold(&email));
            println!(
                "   {} free conversions available",
                bold(&konverta::FREE_CONVERSION_LIMIT.to_string())
            );
            tracing::debug!(principal = %principal.id, "session started");
        }
        Command::Login { email, password } => {
            store.sign_in(&email, &password).await?;
            println!("{} Signed in as {}", green("✔"), bold(&email));
        }
        Command::Logout => {
            store.sign_out().await?;
            println!("{} Signed out", green("✔"));
        }
        Command::Status => cmd_status(&store).await?,
        Command::Formats => cmd_formats(),
        Command::Convert { file, to, delay_ms } => {
            cmd_convert(&store, &file, &to, delay_ms, cli.quiet).await?;
        }
        Command::History => cmd_history(&store).await?,
        Command::Plans => cmd_plans(&catalog),
        Command::Channels => cmd_channels(&catalog),
        Command::Subscribe { plan, channel } => {
            cmd_subscribe(&store, &catalog, &plan, &channel).await?;
        }
        Command::Orders => cmd_orders(&store).await?,
    }

    Ok(())
}

// ── Subcommands ──────────────────────────────────────────────────────────────

async fn cmd_status(store: &Arc<FileStore>) -> Result<()> {
    let Some(user) = store.current_user().await else {
        println!("Not signed in. Try: konverta login --email <EMAIL> --password <PASSWORD>");
        return Ok(());
    };
    println!("Account:   {} <{}>", bold(&user.profile.full_name), user.email);
    if user.profile.is_premium {
        println!("Plan:      {} — unlimited conversions", bold("Premium"));
    } else {
        let remaining = QuotaLedger::remaining(&user.profile).max(0);
        println!(
            "Plan:      Free — {} of {} conversions left",
            bold(&remaining.to_string()),
            konverta::FREE_CONVERSION_LIMIT
        );
    }
    println!("Converted: {} documents", user.profile.conversion_count);
    Ok(())
}

fn cmd_formats() {
    println!("{}", bold("Supported formats"));
    for source in FormatKey::ALL {
        let targets: Vec<&str> = conversion_targets(source).iter().map(|f| f.label()).collect();
        println!("  {:<6} → {}", source.label(), targets.join(", "));
    }
}

async fn cmd_convert(
    store: &Arc<FileStore>,
    file: &PathBuf,
    to: &str,
    delay_ms: u64,
    quiet: bool,
) -> Result<()> {
    let target: FormatKey = to.parse()?;
    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", file.display()))?
        .to_string();

    let principal = store.current_principal().await;
    let mut workflow = ConversionWorkflow::new(
        Arc::new(FixedDelayConverter::new(Duration::from_millis(delay_ms))),
        store.clone(),
        store.clone(),
    );
    let source = workflow.select_file(&name, content)?;
    workflow.choose_target(target)?;

    let bar = if quiet { None } else { Some(spinner(&name, source, target)) };
    let outcome = workflow.submit(&principal).await;
    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }

    match outcome? {
        SubmitOutcome::Converted(receipt) => {
            let document = workflow.download()?;
            tokio::fs::write(&document.filename, &document.bytes)
                .await
                .with_context(|| format!("Failed to write {}", document.filename))?;
            println!(
                "{} {} → {}  {}",
                green("✔"),
                name,
                bold(&document.filename),
                dim(&format!("{}ms", receipt.duration_ms)),
            );
            if !receipt.profile.is_premium {
                let remaining = QuotaLedger::remaining(&receipt.profile).max(0);
                println!("   {} free conversions left", bold(&remaining.to_string()));
            }
        }
        SubmitOutcome::LoginRequired => {
            println!("{} Sign in to convert documents.", cyan("◆"));
            println!("   konverta login --email <EMAIL> --password <PASSWORD>");
        }
        SubmitOutcome::UpgradeRequired => {
            println!(
                "{} Free limit reached: all {} free conversions are used.",
                cyan("◆"),
                konverta::FREE_CONVERSION_LIMIT
            );
            println!("   Upgrade for unlimited conversions: konverta plans");
        }
        SubmitOutcome::ExecutionFailed { detail } => {
            println!("{} Conversion failed: {}", red("✗"), detail);
            println!("   The request is kept — run the same command to retry.");
        }
    }
    Ok(())
}

fn spinner(name: &str, source: FormatKey, target: FormatKey) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix("Converting");
    bar.set_message(format!("{name}  {} → {}", source.label(), target.label()));
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

async fn cmd_history(store: &Arc<FileStore>) -> Result<()> {
    let principal = store.current_principal().await;
    if !principal.authenticated {
        println!("Not signed in.");
        return Ok(());
    }
    let records = store.conversions_for(&principal.id).await?;
    if records.is_empty() {
        println!("No conversions yet.");
        return Ok(());
    }
    println!("{}", bold("Conversion history"));
    for r in records {
        println!(
            "  {}  {:<30} {} → {}  {}",
            dim(&r.created_at.format("%Y-%m-%d %H:%M").to_string()),
            r.original_filename,
            r.original_format.label(),
            r.target_format.label(),
            dim(&format!("{} bytes", r.file_size)),
        );
    }
    Ok(())
}

fn cmd_plans(catalog: &Catalog) {
    println!("{}", bold("Subscription plans"));
    for plan in catalog.plans() {
        let marker = if plan.popular { cyan(" ★ popular") } else { String::new() };
        println!(
            "\n  {} ({})  Rp {}/month{}",
            bold(&plan.name),
            plan.id,
            format_rupiah(plan.price_monthly),
            marker
        );
        for feature in &plan.features {
            println!("    • {feature}");
        }
    }
    println!("\nOrder with: konverta subscribe --plan <ID> --channel <ID>");
}

fn cmd_channels(catalog: &Catalog) {
    println!("{}", bold("Payment channels (manual transfer)"));
    for ch in catalog.channels() {
        println!(
            "  {:<8} {:<14} {}  {}",
            ch.id,
            ch.display_name,
            ch.account_number,
            dim(&ch.account_holder)
        );
    }
}

async fn cmd_subscribe(
    store: &Arc<FileStore>,
    catalog: &Arc<Catalog>,
    plan_id: &str,
    channel_id: &str,
) -> Result<()> {
    let principal = store.current_principal().await;
    let mut workflow = SubscriptionWorkflow::new(catalog.clone(), store.clone());

    match workflow.select_plan(&principal, plan_id)? {
        PlanOutcome::LoginRequired => {
            println!("{} Sign in before ordering a plan.", cyan("◆"));
            return Ok(());
        }
        PlanOutcome::Selected(_) => {}
    }
    let channel = workflow.select_channel(channel_id)?;

    match workflow.confirm(&principal).await? {
        ConfirmOutcome::Submitted(order) => {
            println!("{} Order submitted — awaiting transfer verification", green("✔"));
            println!("\n  Plan:      {}", bold(&order.plan_name));
            println!("  Amount:    Rp {}/month", format_rupiah(order.price_monthly));
            println!("  Transfer:  {}", bold(&channel.display_name));
            println!("             {}  a.n. {}", channel.account_number, channel.account_holder);
            println!(
                "\n{}",
                dim("Your plan activates once the transfer is verified (status: pending).")
            );
        }
        ConfirmOutcome::LoginRequired => {
            println!("{} Sign in before confirming payment.", cyan("◆"));
        }
    }
    Ok(())
}

async fn cmd_orders(store: &Arc<FileStore>) -> Result<()> {
    let principal = store.current_principal().await;
    if !principal.authenticated {
        println!("Not signed in.");
        return Ok(());
    }
    let orders = store.orders_for(&principal.id).await?;
    if orders.is_empty() {
        println!("No subscription orders yet.");
        return Ok(());
    }
    println!("{}", bold("Subscription orders"));
    for o in orders {
        println!(
            "  {}  {:<12} Rp {:>8}  via {:<14} {:?}",
            dim(&o.created_at.format("%Y-%m-%d %H:%M").to_string()),
            o.plan_name,
            format_rupiah(o.price_monthly),
            o.payment_channel,
            o.status,
        );
    }
    Ok(())
}

/// Format a rupiah amount with dot thousands separators (49000 → "49.000").
fn format_rupiah(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    let offset = digits.len() % 3;
    for (i, ch) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - offset) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    grouped
}
