//! EduBot - Terminal client for the document Q&A service
//!
//! Reads questions and commands from stdin, prints the conversation as it
//! grows and reports uploads and deletes as they settle.
//!
//! # Usage
//!
//! ```bash
//! # Talk to the default service (http://localhost:8000)
//! edubot
//!
//! # Another service
//! edubot --api-base https://edubot.example.org
//!
//! # Continue a stored conversation
//! edubot --resume chat-1234
//!
//! # Verbose logging (goes to stderr)
//! RUST_LOG=debug edubot
//! ```

mod commands;
mod display;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{info, warn};

use edubot_core::{
    default_config_path, load_config_from_path, ClientConfig, ConfigOverrides, DocumentDesk,
    DocumentId, DocumentLimits, DocumentStatus, FileSelection, HttpBackend, LocalFile,
    ManagerEvent, RemoteService, SessionId, SessionManager, SessionSettings, SubjectInput,
    SubmitStatus,
};

use commands::{Command, HELP};

/// EduBot - ask questions about your uploaded PDFs
#[derive(Parser, Debug)]
#[command(name = "edubot")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Base URL of the document Q&A service
    #[arg(short = 'a', long, value_name = "URL")]
    api_base: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "EDUBOT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Continue the conversation with this chat id
    #[arg(short = 'r', long, value_name = "CHAT_ID")]
    resume: Option<String>,

    /// Seconds to wait for an answer
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Load stored history when a conversation starts
    #[arg(long)]
    load_history: bool,

    /// Start without the greeting
    #[arg(long)]
    no_greeting: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "EDUBOT_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref url) = self.api_base {
            overrides = overrides.with_base_url(url.clone());
        }
        if let Some(secs) = self.timeout {
            overrides = overrides.with_chat_timeout_secs(secs);
        }
        if self.load_history {
            overrides = overrides.with_load_history_on_start(true);
        }
        if self.no_greeting {
            overrides = overrides.with_greet_on_start(false);
        }
        overrides
    }
}

/// Initialize logging with the specified level
///
/// Logs go to stderr so they never interleave with the conversation.
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("edubot={level},edubot_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// The interactive session
struct App<B: RemoteService + ?Sized + 'static, R> {
    manager: SessionManager<B>,
    desk: DocumentDesk<B>,
    selection: FileSelection,
    input: Lines<R>,
    /// Turns of the current log already on screen
    printed: usize,
}

impl<B, R> App<B, R>
where
    B: RemoteService + ?Sized + 'static,
    R: AsyncBufRead + Unpin,
{
    fn new(backend: &Arc<B>, config: &ClientConfig, input: R) -> Self {
        Self {
            manager: SessionManager::new(Arc::clone(backend), SessionSettings::from(config)),
            desk: DocumentDesk::new(Arc::clone(backend), DocumentLimits::from(config)),
            selection: FileSelection::new(),
            input: input.lines(),
            printed: 0,
        }
    }

    fn start(&mut self) {
        self.manager.start_conversation();
        self.printed = 0;
    }

    fn resume(&mut self, id: String) {
        self.manager.resume_conversation(SessionId::new(id));
        self.printed = 0;
        println!("Loading conversation history...");
    }

    /// Run until `/quit` or end of input
    ///
    /// `/quit` abandons whatever is still running. End of input first waits
    /// for pending answers and document operations.
    async fn run(&mut self) -> Result<()> {
        let input_closed = loop {
            self.print_new_turns();

            tokio::select! {
                line = self.input.next_line() => {
                    let Some(line) = line.context("Failed to read input")? else {
                        break true;
                    };
                    if !self.handle(Command::parse(&line)).await? {
                        break false;
                    }
                }
                Some(event) = self.manager.settle(), if self.manager.has_pending() => {
                    self.on_event(&event);
                }
                Some(report) = self.desk.settle(), if self.desk.in_flight() > 0 => {
                    println!("{}", display::report(&report));
                }
            }
        };

        if input_closed {
            self.drain().await;
        }
        self.manager.shutdown();
        self.desk.shutdown();
        Ok(())
    }

    /// Apply completions until nothing is left running
    async fn drain(&mut self) {
        loop {
            self.print_new_turns();

            tokio::select! {
                Some(event) = self.manager.settle(), if self.manager.has_pending() => {
                    self.on_event(&event);
                }
                Some(report) = self.desk.settle(), if self.desk.in_flight() > 0 => {
                    println!("{}", display::report(&report));
                }
                else => break,
            }
        }
        self.print_new_turns();
    }

    fn print_new_turns(&mut self) {
        for turn in self.manager.log().since(self.printed) {
            println!("{}", display::turn(turn));
        }
        self.printed = self.manager.log().len();
    }

    fn on_event(&mut self, event: &ManagerEvent) {
        match event {
            // History lands in front of anything already printed
            ManagerEvent::HistoryLoaded { .. } | ManagerEvent::HistoryUnavailable => {
                let prepended = self.manager.log().len().saturating_sub(self.printed);
                if let ManagerEvent::HistoryLoaded { turns } = event {
                    println!("--- {turns} earlier messages ---");
                }
                for turn in &self.manager.log().turns()[..prepended] {
                    println!("{}", display::turn(turn));
                }
                self.printed = self.manager.log().len();
            }
            ManagerEvent::Recovered { session_id } => {
                info!(session_id = %session_id, "Continuing with a new session");
            }
            ManagerEvent::Answered { .. } | ManagerEvent::Stale => {}
        }
    }

    /// Apply one command; returns `false` to quit
    async fn handle(&mut self, command: Command) -> Result<bool> {
        match command {
            Command::Ask(text) => {
                if self.manager.submit(&text) == SubmitStatus::Busy {
                    println!("Still waiting for the previous answer.");
                }
            }
            Command::New => self.start(),
            Command::Resume(id) => self.resume(id),
            Command::Upload { path, subject } => self.upload(path, subject).await?,
            Command::Files => println!("{}", display::library(self.desk.library().entries())),
            Command::Delete(id) => self.delete(DocumentId::new(id)).await?,
            Command::Session => println!("{}", display::session(self.manager.session())),
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(false),
            Command::Usage(usage) => println!("Usage: {usage}"),
            Command::Unknown(name) => println!("Unknown command /{name}. Type /help."),
        }
        Ok(true)
    }

    async fn upload(&mut self, path: PathBuf, subject: Option<String>) -> Result<()> {
        let file = match LocalFile::from_path(&path).await {
            Ok(file) => file,
            Err(e) => {
                println!("Cannot read {}: {e}", path.display());
                return Ok(());
            }
        };
        let name = file.name.clone();
        self.selection.select(file);

        let subject = match subject {
            Some(subject) => SubjectInput::Entered(subject),
            None => SubjectInput::from(self.prompt("Subject (Enter for General): ").await?),
        };

        match self.desk.upload(&mut self.selection, subject) {
            Ok(ticket) => println!("Uploading {name} {ticket}..."),
            Err(rejection) => println!("Not uploaded: {rejection}"),
        }
        Ok(())
    }

    async fn delete(&mut self, id: DocumentId) -> Result<()> {
        let question = self
            .desk
            .library()
            .get(&id)
            .filter(|entry| entry.status() == DocumentStatus::Active)
            .map(|entry| format!("Delete {} [{}]? [y/N] ", entry.name, entry.subject));

        let confirmed = match question {
            Some(question) => self
                .prompt(&question)
                .await?
                .is_some_and(|answer| commands::is_yes(&answer)),
            None => false,
        };

        match self.desk.delete(&id, |_| confirmed) {
            Ok(ticket) => println!("Deleting {id} {ticket}..."),
            Err(rejection) => println!("Not deleted: {rejection}"),
        }
        Ok(())
    }

    async fn prompt(&mut self, question: &str) -> Result<Option<String>> {
        print!("{question}");
        std::io::stdout().flush()?;
        self.input
            .next_line()
            .await
            .context("Failed to read input")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(config_path).context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;
    info!(
        base_url = %config.base_url,
        source = %config.source(),
        "Configuration loaded"
    );

    let backend = Arc::new(
        HttpBackend::new(&config.base_url).context("Failed to set up the service client")?,
    );
    if !backend.health_check().await {
        warn!(base_url = %config.base_url, "Service is not answering");
        println!(
            "Note: {} is not answering. Questions get quick offline answers until it does.",
            config.base_url
        );
    }

    let mut app = App::new(&backend, &config, BufReader::new(tokio::io::stdin()));
    match args.resume {
        Some(id) => app.resume(id),
        None => app.start(),
    }
    println!("Type a question, or /help for commands.");

    app.run().await
}
