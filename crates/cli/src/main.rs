use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use narutalk_chat::{Message, MessageId};
use narutalk_client::{
    ChatConfig, ChatSession, ConfigError, HttpTransport, SessionError, SessionHandle,
    SessionStart, TracingObserver, TransportError,
};
use snafu::{ResultExt, Snafu};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "narutalk")]
#[command(about = "Terminal client for the NaruTalk streaming assistant")]
struct Args {
    /// Settings file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL, overriding the settings file
    #[arg(long, env = "NARUTALK_BASE_URL")]
    base_url: Option<String>,

    /// Append diagnostic detail to error replies
    #[arg(long)]
    debug_errors: bool,
}

#[derive(Debug, Snafu)]
enum CliError {
    #[snafu(display("{source}"))]
    LoadConfig {
        stage: &'static str,
        source: ConfigError,
    },
    #[snafu(display("failed to set up transport: {source}"))]
    BuildTransport {
        stage: &'static str,
        source: TransportError,
    },
    #[snafu(display("terminal i/o failed on `{stage}`: {source}"))]
    Terminal {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("session failed on `{stage}`: {source}"))]
    Session {
        stage: &'static str,
        source: SessionError,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run(Args::parse()).await {
        eprintln!("narutalk: {error}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    let config = load_config(&args)?;
    let transport = HttpTransport::new(&config).context(BuildTransportSnafu {
        stage: "build-transport",
    })?;
    tracing::info!(url = transport.url(), "using chat endpoint");

    let SessionStart { handle, worker } =
        ChatSession::start(config, Arc::new(transport), Arc::new(TracingObserver));
    tokio::spawn(worker);

    let mut stdout = std::io::stdout();
    print_transcript(&handle, &mut stdout)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(&mut stdout)?;
        let Some(line) = lines.next_line().await.context(TerminalSnafu {
            stage: "read-input",
        })?
        else {
            break;
        };

        match line.trim() {
            "/quit" => break,
            "/clear" => {
                handle.clear().await.context(SessionSnafu {
                    stage: "clear-transcript",
                })?;
                print_transcript(&handle, &mut stdout)?;
            }
            _ => match handle.send(line).await {
                Ok(message_id) => stream_reply(&handle, message_id, &mut stdout).await?,
                Err(error @ (SessionError::EmptyMessage | SessionError::ExchangeInFlight { .. })) => {
                    writeln!(stdout, "({error})").context(TerminalSnafu {
                        stage: "write-rejection",
                    })?;
                }
                Err(error) => {
                    return Err(error).context(SessionSnafu {
                        stage: "send-message",
                    });
                }
            },
        }
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<ChatConfig, CliError> {
    let path = args
        .config
        .clone()
        .unwrap_or_else(ChatConfig::default_config_path);
    let mut config = ChatConfig::load_from(&path).context(LoadConfigSnafu {
        stage: "load-config",
    })?;

    if let Some(base_url) = &args.base_url {
        config.base_url.clone_from(base_url);
    }
    if args.debug_errors {
        config.debug_errors = true;
    }
    Ok(config.normalized())
}

fn prompt(out: &mut impl Write) -> Result<(), CliError> {
    write!(out, "> ")
        .and_then(|()| out.flush())
        .context(TerminalSnafu {
            stage: "write-prompt",
        })
}

fn print_transcript(handle: &SessionHandle, out: &mut impl Write) -> Result<(), CliError> {
    let snapshot = handle.snapshot();
    for message in snapshot.transcript.messages() {
        writeln!(out, "{}", message.content).context(TerminalSnafu {
            stage: "write-transcript",
        })?;
    }
    Ok(())
}

async fn stream_reply(
    handle: &SessionHandle,
    message_id: MessageId,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let mut snapshots = handle.subscribe();
    let mut printer = ReplyPrinter::default();

    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        if let Some(message) = snapshot.transcript.get(message_id) {
            printer.render(message, out).context(TerminalSnafu {
                stage: "write-reply",
            })?;
        }
        // A clear from elsewhere drops the message; stop once nothing streams.
        if !snapshot.is_busy() {
            break;
        }
        if snapshots.changed().await.is_err() {
            break;
        }
    }

    printer.finish(out).context(TerminalSnafu {
        stage: "write-reply",
    })
}

/// Prints a growing reply incrementally.
#[derive(Debug, Default)]
struct ReplyPrinter {
    printed: String,
    badge: Option<String>,
}

impl ReplyPrinter {
    fn render(&mut self, message: &Message, out: &mut impl Write) -> std::io::Result<()> {
        if message.content != self.printed {
            match message.content.strip_prefix(self.printed.as_str()) {
                Some(rest) => write!(out, "{rest}")?,
                // Replaced rather than extended: start the reply over.
                None if self.printed.is_empty() => write!(out, "{}", message.content)?,
                None => write!(out, "\n{}", message.content)?,
            }
            self.printed.clone_from(&message.content);
            out.flush()?;
        }
        if !message.streaming {
            self.badge = message.agent_kind.as_ref().map(|agent| agent.display_name());
        }
        Ok(())
    }

    fn finish(self, out: &mut impl Write) -> std::io::Result<()> {
        match self.badge {
            Some(badge) => writeln!(out, "\n[{badge}]"),
            None => writeln!(out),
        }
    }
}
