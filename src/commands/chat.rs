use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use anyhow::Context;
use base64::Engine;
use clap::Subcommand;

use super::{OutputFormat, interrupt_flag, print_json};
use crate::chat::{
    AbortRequest, Attachment, ChatMessage, ChatSession, ChatTransport, HttpTransport, Role,
    TurnOutcome, load_history, send_message,
};
use crate::config;
use crate::error::ExitError;

const DEFAULT_SESSION: &str = "agent:main:main";

#[derive(Debug, Subcommand)]
pub enum ChatCommand {
    /// Send one message and stream the reply
    Send {
        message: String,
        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,
        /// Attach an image (png, jpg, gif, webp); repeatable
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
    /// Show the session transcript without system chatter
    History {
        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Ask the server to stop a running turn
    Abort {
        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Interactive chat; Ctrl-C stops the current reply, /quit or Ctrl-C at the prompt exits
    Open {
        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,
    },
}

impl ChatCommand {
    pub fn execute(&self) -> anyhow::Result<()> {
        let transport = HttpTransport::new(&config::chat_url());
        match self {
            Self::Send {
                message,
                session,
                images,
            } => {
                let attachments = images
                    .iter()
                    .map(|p| load_image(p))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                let cancel = interrupt_flag()?;
                let mut chat = ChatSession::new(session.as_str());
                let mut printer = StreamPrinter::default();
                let outcome = send_message(
                    &mut chat,
                    &transport,
                    message,
                    attachments,
                    &cancel,
                    |s| printer.update(s),
                );
                finish_turn(&chat, &outcome, &printer)
            }
            Self::History { session, format } => {
                let mut chat = ChatSession::new(session.as_str());
                load_history(&mut chat, &transport)?;
                match format {
                    OutputFormat::Json => print_json(chat.messages()),
                    OutputFormat::Text => {
                        for message in chat.messages() {
                            print!("{}", render_message(message));
                        }
                        Ok(())
                    }
                }
            }
            Self::Abort { session, run_id } => {
                transport.abort(&AbortRequest {
                    session_key: session.clone(),
                    run_id: run_id.clone(),
                })?;
                println!("✅ Abort requested");
                Ok(())
            }
            Self::Open { session } => open(&transport, session),
        }
    }
}

fn open(transport: &HttpTransport, session_key: &str) -> anyhow::Result<()> {
    let cancel = interrupt_flag()?;
    let skin = termimad::MadSkin::default();
    let mut chat = ChatSession::new(session_key);

    if let Err(e) = load_history(&mut chat, transport) {
        tracing::warn!(error = %e, "could not load history");
    }
    for message in chat.messages() {
        print_markdown(&skin, message);
    }

    loop {
        cancel.store(false, Ordering::Relaxed);
        let input = dialoguer::Input::<String>::new()
            .with_prompt("you")
            .allow_empty(true)
            .interact_text()
            .ok();
        let Some(input) = prompt_input(input, cancel.load(Ordering::Relaxed)) else {
            break;
        };

        let outcome = send_message(&mut chat, transport, &input, Vec::new(), &cancel, |_| {});
        match outcome {
            TurnOutcome::Ignored => {}
            TurnOutcome::Finished(message) => print_markdown(&skin, &message),
            TurnOutcome::Ended => {
                if let Some(message) = chat.messages().last() {
                    print_markdown(&skin, message);
                }
            }
            TurnOutcome::Aborted => eprintln!("(stopped)"),
            TurnOutcome::Failed => {
                eprintln!("error: {}", chat.error().unwrap_or("An error occurred"));
            }
        }
    }
    Ok(())
}

/// The line to send, or `None` when the session should end: the prompt
/// failed, Ctrl-C was pressed while it was open, or the user typed /quit.
fn prompt_input(input: Option<String>, interrupted: bool) -> Option<String> {
    let input = input.filter(|_| !interrupted)?;
    if matches!(input.trim(), "/quit" | "/exit") {
        return None;
    }
    Some(input)
}

fn print_markdown(skin: &termimad::MadSkin, message: &ChatMessage) {
    let label = match message.role {
        Role::User => "**you**",
        Role::Assistant => "**agent**",
        Role::System => "**system**",
    };
    skin.print_text(&format!("{label}\n\n{}\n", message.text()));
}

fn finish_turn(chat: &ChatSession, outcome: &TurnOutcome, printer: &StreamPrinter) -> anyhow::Result<()> {
    match outcome {
        TurnOutcome::Ignored => Err(ExitError::new(2, "message is empty".into()).into()),
        TurnOutcome::Finished(message) => {
            // The final text may differ from what streamed (internal text removed).
            let text = message.text();
            if printer.printed == 0 && !text.is_empty() {
                print!("{text}");
            }
            println!();
            Ok(())
        }
        TurnOutcome::Ended => {
            println!();
            Ok(())
        }
        TurnOutcome::Aborted => {
            println!();
            eprintln!("aborted");
            Ok(())
        }
        TurnOutcome::Failed => Err(ExitError::new(
            1,
            chat.error().unwrap_or("An error occurred").to_string(),
        )
        .into()),
    }
}

/// Prints the streaming assistant text as it grows.
#[derive(Debug, Default)]
struct StreamPrinter {
    printed: usize,
}

impl StreamPrinter {
    fn update(&mut self, chat: &ChatSession) {
        let Some(message) = chat.messages().last() else {
            return;
        };
        if message.role != Role::Assistant || !message.is_streaming {
            return;
        }
        let text = message.text();
        let total = text.chars().count();
        if total > self.printed {
            let suffix: String = text.chars().skip(self.printed).collect();
            print!("{suffix}");
            let _ = std::io::stdout().flush();
            self.printed = total;
        }
    }
}

fn render_message(message: &ChatMessage) -> String {
    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    };
    #[allow(clippy::cast_precision_loss)]
    let time = super::local_time(message.timestamp as f64, true);
    let images = message.content.len() - message.content.iter().filter(|c| c.as_text().is_some()).count();
    let mut out = format!("[{time}] {role}: {}\n", message.text());
    if images > 0 {
        out.push_str(&format!("   ({images} image(s))\n"));
    }
    out
}

fn load_image(path: &Path) -> anyhow::Result<Attachment> {
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => {
            return Err(ExitError::new(2, format!("{}: unsupported image type", path.display())).into());
        }
    };
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(Attachment::image(mime, &encoded))
}
