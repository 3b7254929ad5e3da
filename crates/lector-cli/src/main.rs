//! CLI front end — reads a file (or stdin) aloud with word-by-word echo.
//!
//! The terminal stands in for a host page: the text source is the file
//! contents, the "highlight" prints each word to stdout as it is spoken,
//! and status lines go to stderr.

use std::io::{Read as _, Write as _};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use clap::Parser;

use lector_core::{
    ActionId, HighlightRoot, PlaybackSession, ReaderConfig, ReaderError, StatusSink, TextSource,
    WordToken, text,
};

/// Read text aloud with synchronized word-by-word output.
#[derive(Parser)]
#[command(name = "lector")]
#[command(about = "Read a text file aloud", version)]
struct Cli {
    /// File to read; stdin when omitted
    file: Option<PathBuf>,

    /// Google TTS API key (overrides LECTOR_TTS_KEY)
    #[arg(long, env = "LECTOR_TTS_KEY")]
    key: Option<String>,

    /// Remote voice name
    #[arg(long)]
    voice: Option<String>,

    /// Remote voice language code
    #[arg(long)]
    language: Option<String>,

    /// Remote speaking rate (1.0 = normal)
    #[arg(long)]
    rate: Option<f32>,

    /// Treat the input as HTML and strip its markup first
    #[arg(long)]
    html: bool,
}

// ── Terminal adapters ──────────────────────────────────────────────

struct StderrSink;

impl StatusSink for StderrSink {
    fn set_status(&self, message: &str) {
        eprintln!("{message}");
    }
}

/// A word that prints itself when the highlight reaches it.
struct TerminalWord {
    word: String,
}

impl WordToken for TerminalWord {
    fn mark_current(&self) {
        print!("{} ", self.word);
        let _ = std::io::stdout().flush();
    }

    fn clear(&self) {}
}

struct TerminalRoot {
    words: Vec<String>,
}

impl HighlightRoot for TerminalRoot {
    fn word_tokens(&self) -> Vec<Arc<dyn WordToken>> {
        self.words
            .iter()
            .map(|w| Arc::new(TerminalWord { word: w.clone() }) as Arc<dyn WordToken>)
            .collect()
    }
}

struct FileSource {
    text: String,
}

impl TextSource for FileSource {
    fn text(&self, _action: &ActionId) -> Result<String, ReaderError> {
        Ok(self.text.clone())
    }

    fn highlight_roots(&self, _action: &ActionId) -> Vec<Arc<dyn HighlightRoot>> {
        vec![Arc::new(TerminalRoot {
            words: text::words(&self.text),
        })]
    }
}

// ── Entry point ────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let raw = match &cli.file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    let content = if cli.html {
        text::plain_text(&raw)
    } else {
        raw
    };

    let mut config = ReaderConfig::from_env();
    if cli.key.is_some() {
        config.api_key = cli.key.clone();
    }
    if let Some(voice) = cli.voice {
        config.voice.name = voice;
    }
    if let Some(language) = cli.language {
        config.voice.language_code = language;
    }
    if let Some(rate) = cli.rate {
        config.speaking_rate = rate;
    }

    let source: Arc<dyn TextSource> = Arc::new(FileSource { text: content });
    let session = PlaybackSession::new(&source, Arc::new(StderrSink), config)?;

    let action = ActionId::from("cli");
    session.play(&action);
    if !session.is_playing() {
        // Unavailable / nothing to read; the sink already said why.
        return Ok(());
    }
    tracing::info!(mode = ?session.mode(), "Reading");

    // Ctrl-C stops; otherwise wait for natural completion.
    let interrupted = Arc::new(Mutex::new(false));
    {
        let session = Arc::clone(&session);
        let interrupted = Arc::clone(&interrupted);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                *interrupted.lock().unwrap_or_else(PoisonError::into_inner) = true;
                session.stop();
            }
        });
    }

    while session.is_playing() {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    println!();

    if *interrupted.lock().unwrap_or_else(PoisonError::into_inner) {
        std::process::exit(130);
    }
    Ok(())
}
