use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand, ValueEnum};

use inbox_sweeper::browser::ChromiumDriver;
use inbox_sweeper::config::{AppConfig, llm_config_from_env};
use inbox_sweeper::jobs::{JobQueue, LocalJobQueue};
use inbox_sweeper::llm::create_provider;
use inbox_sweeper::mail::{DisabledMailSender, EmailFacts, MailSender, SmtpMailSender};
use inbox_sweeper::oracle::AiOracle;
use inbox_sweeper::store::{Database, LibSqlBackend, NewEmail};
use inbox_sweeper::unsubscribe::{
    ReqwestProbe, UnsubscribeDispatchHandler, UnsubscribeRequest, UnsubscribeResolver,
};

/// Unsubscribe resolution for stored emails.
#[derive(Debug, Parser)]
#[command(name = "inbox-sweeper", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve unsubscribes for the given email ids and wait for them
    Unsubscribe {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Import RFC 822 files as emails owned by a user
    Import {
        address: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print unread notifications and mark them read
    Notifications { user_id: i64 },
    /// Turn List-Unsubscribe handling on or off for a user
    ListUnsubscribe { address: String, enabled: Toggle },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn is_on(self) -> bool {
        self == Toggle::On
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = AppConfig::from_env();
    let db = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );

    match cli.command {
        Command::Unsubscribe { ids } => unsubscribe(&config, db, ids).await,
        Command::Import { address, files } => import(db.as_ref(), &address, &files).await,
        Command::Notifications { user_id } => notifications(db.as_ref(), user_id).await,
        Command::ListUnsubscribe { address, enabled } => {
            let user_id = db.ensure_user(&address).await?;
            db.set_use_list_unsubscribe(user_id, enabled.is_on()).await?;
            eprintln!("List-Unsubscribe for {address} (user {user_id}): {enabled:?}");
            Ok(())
        }
    }
}

async fn unsubscribe(config: &AppConfig, db: Arc<LibSqlBackend>, ids: Vec<i64>) -> anyhow::Result<()> {
    let llm = create_provider(&llm_config_from_env()?)?;
    let oracle = AiOracle::new(llm);
    let probe = Arc::new(ReqwestProbe::new(&config.probe)?);
    let browser = Arc::new(ChromiumDriver::new(config.browser.clone()));
    let mail: Arc<dyn MailSender> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailSender::new(smtp.clone())),
        None => {
            tracing::warn!("SMTP_HOST not set; mailto unsubscribes will fail");
            Arc::new(DisabledMailSender)
        }
    };

    let reset = db.reset_stale_in_progress(config.jobs.stale_in_progress).await?;
    if reset > 0 {
        eprintln!("Reset {reset} stale in-progress unsubscribe(s)");
    }

    let resolver = Arc::new(UnsubscribeResolver::new(probe, oracle.clone(), browser));
    let store: Arc<dyn Database> = db.clone();
    let handler = Arc::new(UnsubscribeDispatchHandler::new(store, oracle, resolver, mail));
    let queue = LocalJobQueue::start(handler, &config.jobs);

    for &email_id in &ids {
        queue.enqueue(UnsubscribeRequest { email_id }).await?;
    }
    queue.shutdown().await;

    for email_id in ids {
        match db.get_email(email_id).await? {
            Some(email) => {
                let status = email
                    .unsubscribe_status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "none".into());
                println!("{email_id}\t{status}\t{}", email.sender);
            }
            None => println!("{email_id}\tmissing"),
        }
    }
    Ok(())
}

async fn import(db: &dyn Database, address: &str, files: &[PathBuf]) -> anyhow::Result<()> {
    let owner_id = db.ensure_user(address).await?;
    for path in files {
        let email_id = import_one(db, owner_id, path)
            .await
            .with_context(|| format!("Failed to import {}", path.display()))?;
        println!("{email_id}\t{}", path.display());
    }
    Ok(())
}

async fn import_one(db: &dyn Database, owner_id: i64, path: &Path) -> anyhow::Result<i64> {
    let raw = tokio::fs::read(path).await?;
    let facts = EmailFacts::from_rfc822(&raw)?;
    let email_id = db
        .insert_email(&NewEmail {
            owner_id,
            subject: facts.subject,
            sender: facts.sender,
            body: facts.body,
            list_unsubscribe: facts.list_unsubscribe,
        })
        .await?;
    Ok(email_id)
}

async fn notifications(db: &dyn Database, user_id: i64) -> anyhow::Result<()> {
    let unread = db.list_notifications(user_id, true).await?;
    if unread.is_empty() {
        eprintln!("No unread notifications");
    }
    for note in unread {
        println!(
            "{}\t{}\t{}\t{}",
            note.created_at.format("%Y-%m-%d %H:%M:%S"),
            note.kind,
            note.related_email_id.map(|id| id.to_string()).unwrap_or_default(),
            note.message
        );
        db.mark_notification_read(note.id).await?;
    }
    Ok(())
}
