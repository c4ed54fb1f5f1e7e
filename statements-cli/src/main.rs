use anyhow::{Context, Result, bail};
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use statements_core::{
    Account, ClickAction, FileKind, FileSelectionDialog, MonthKey, ParseOutcome,
    ParseProgressDialog, PollPhase, ProgressRecord, ResultsDialog, account, classify_name,
    render_cell,
};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod api;
mod auth;
mod bulk;
mod config;
mod poller;
mod render;
mod state;
mod upload;

use api::ApiClient;
use config::Config;
use state::SessionState;

#[derive(Parser, Debug)]
#[command(name = "statements", version, about = "Bank statements manager")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the REST backend
    Serve {
        /// Override `[server] bind`
        #[arg(long)]
        bind: Option<String>,
        /// Override `[server] store_root`
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Store the API token used for every request
    Login {
        #[arg(long)]
        token: Option<String>,
    },

    /// Configuration file management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Check filenames against the naming schemes, offline
    Classify {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Year calendar of every account
    Calendar {
        #[arg(long)]
        year: Option<i32>,
    },

    /// Month-by-month detail of one account
    Account {
        account_id: String,
        #[arg(long)]
        year: Option<i32>,
    },

    /// Upload statement files
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Year whose data is refetched after the upload
        #[arg(long)]
        year: Option<i32>,
    },

    /// Parse new or changed statements of an account
    Parse {
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        account_id: Option<String>,
        #[arg(long)]
        all: bool,
    },

    /// Rescan the store and rebuild the inventory
    Refresh {
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        account_id: Option<String>,
        #[arg(long)]
        all: bool,
    },

    /// Download one month's statement
    Download {
        account_id: String,
        /// 1-12
        month: u32,
        #[arg(long)]
        year: Option<i32>,
        /// Which variant; asked for when an STP month has both
        #[arg(long = "type", value_enum)]
        file_type: Option<FileType>,
        /// Directory to write into
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default config if none exists
    Init,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum FileType {
    Xlsx,
    Pdf,
}

impl From<FileType> for FileKind {
    fn from(t: FileType) -> Self {
        match t {
            FileType::Xlsx => FileKind::Xlsx,
            FileType::Pdf => FileKind::Pdf,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, store } => {
            let mut cfg = config::load_config()?.server;
            if let Some(bind) = bind {
                cfg.bind = bind;
            }
            if let Some(store) = store {
                cfg.store_root = store;
            }
            statements_server::serve(cfg).await?;
        }

        Command::Login { token } => auth::login(token)?,

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
        },

        Command::Classify { names } => {
            for name in names {
                match classify_name(&name) {
                    Ok(c) => println!("[ok] {name}: {}", c.describe()),
                    Err(e) => println!("[x ] {name}: {e}"),
                }
            }
        }

        Command::Calendar { year } => {
            let (cfg, client) = connect()?;
            let mut state = SessionState::new(year_or_default(&cfg, year));
            let report = bulk::load_accounts(
                &mut state,
                cfg.client.bulk_stagger(),
                |id, y| {
                    let client = client.clone();
                    async move { client.load_account_data(id, y).await }
                },
                |p, id| eprintln!("[{:>3}%] loaded {id}", p.percentage()),
            )
            .await;
            print!("{}", render::calendar(state.year, state.loaded()));
            for (id, err) in &report.failed {
                eprintln!("{id}: {err}");
            }
        }

        Command::Account { account_id, year } => {
            let account = known_account(&account_id)?;
            let (cfg, client) = connect()?;
            let year = year_or_default(&cfg, year);
            let data = client.load_account_data(account.id, year).await?;
            print!("{}", render::account_detail(&data, year));
        }

        Command::Upload { files, year } => {
            let (cfg, client) = connect()?;
            let mut state = SessionState::new(year_or_default(&cfg, year));
            let prepared = upload::prepare(&files)?;
            print!("{}", render::upload_dialog(&prepared.dialog()));
            let report = upload::run(&client, &mut state, &prepared).await?;
            print!("{}", render::results(&ResultsDialog::uploads(&report.results)));
            for data in state.loaded() {
                println!();
                print!("{}", render::account_detail(data, state.year));
            }
        }

        Command::Parse { account_id, all } => {
            let (cfg, client) = connect()?;
            let interval = cfg.client.poll_interval();
            let fetch = |sid: String| {
                let client = client.clone();
                async move { client.parse_progress(&sid).await }
            };
            let (name, phase) = if all {
                let phase = poller::drive(
                    client.start_parse_all(),
                    interval,
                    fetch,
                    show_progress("All accounts"),
                )
                .await?;
                ("All accounts", phase)
            } else {
                let account = known_account(account_id.as_deref().unwrap_or_default())?;
                let phase = poller::drive(
                    client.start_parse(account.id),
                    interval,
                    fetch,
                    show_progress(account.name),
                )
                .await?;
                (account.name, phase)
            };
            finish(name, phase)?;
        }

        Command::Refresh { account_id, all } => {
            let (cfg, client) = connect()?;
            let interval = cfg.client.poll_interval();
            let fetch = |sid: String| {
                let client = client.clone();
                async move { client.inventory_progress(&sid).await }
            };
            let (name, phase) = if all {
                let phase = poller::drive(
                    client.refresh_all_inventories(),
                    interval,
                    fetch,
                    show_progress("All accounts"),
                )
                .await?;
                ("All accounts", phase)
            } else {
                let account = known_account(account_id.as_deref().unwrap_or_default())?;
                let phase = poller::drive(
                    client.refresh_inventory(account.id),
                    interval,
                    fetch,
                    show_progress(account.name),
                )
                .await?;
                (account.name, phase)
            };
            finish(name, phase)?;
        }

        Command::Download {
            account_id,
            month,
            year,
            file_type,
            out,
        } => {
            let account = known_account(&account_id)?;
            let (cfg, client) = connect()?;
            let key = MonthKey::new(year_or_default(&cfg, year), month)?;
            let kind = match file_type {
                Some(t) => t.into(),
                None => pick_file(&client, account, key).await?,
            };
            let download = client.download(account.id, key.year(), key.month(), kind).await?;
            let path = out.join(&download.filename);
            std::fs::write(&path, &download.bytes)
                .with_context(|| format!("write {}", path.display()))?;
            println!("Saved {} ({} bytes)", path.display(), download.bytes.len());
        }
    }

    Ok(())
}

fn connect() -> Result<(Config, ApiClient)> {
    let cfg = config::load_config()?;
    let token = auth::load_auth()?.token;
    let client = ApiClient::new(&cfg.client.base_url, token.as_deref())?;
    Ok((cfg, client))
}

fn year_or_default(cfg: &Config, year: Option<i32>) -> i32 {
    year.or(cfg.client.year).unwrap_or_else(|| Utc::now().year())
}

fn known_account(id: &str) -> Result<&'static Account> {
    match account::by_id(id) {
        Some(a) => Ok(a),
        None => bail!(
            "unknown account: {id} (known: {})",
            account::ids().collect::<Vec<_>>().join(", ")
        ),
    }
}

/// Same choice a click on the calendar cell makes.
async fn pick_file(client: &ApiClient, account: &Account, key: MonthKey) -> Result<FileKind> {
    let data = client.load_account_data(account.id, key.year()).await?;
    let record = data.month(key).map(|view| view.record());
    match render_cell(account, key, record.as_ref()).click {
        ClickAction::Download { kind } => Ok(kind),
        ClickAction::ChooseFile => {
            if let Some(record) = &record {
                let dialog = FileSelectionDialog::new(account, key, record);
                print!("{}", render::file_selection(&dialog));
            }
            bail!("both files are on record; pick one with --type")
        }
        ClickAction::None => bail!("no statement for {} {key}", account.name),
    }
}

fn show_progress(name: &str) -> impl FnMut(&ProgressRecord) + '_ {
    move |record| {
        let line = render::progress_line(&ParseProgressDialog::new(name, record));
        print!("\r{line}\x1b[K");
        std::io::stdout().flush().ok();
    }
}

fn finish(name: &str, phase: PollPhase) -> Result<()> {
    println!();
    match phase {
        PollPhase::Completed(outcome) => {
            print!("{}", render::results(&ResultsDialog::parse(name, &outcome)));
            Ok(())
        }
        PollPhase::Error(message) => {
            let outcome = ParseOutcome::Failed { message };
            print!("{}", render::results(&ResultsDialog::parse(name, &outcome)));
            bail!("{}", outcome.message())
        }
        other => bail!("polling stopped early in phase {other:?}"),
    }
}
