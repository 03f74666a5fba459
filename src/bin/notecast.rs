//! CLI binary for notecast.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `NotecastConfig`, runs the stages for one document and writes every
//! artifact into an output directory.

use anyhow::{Context, Result};
use clap::Parser;
use notecast::{
    markdown, render, ExportOptions, ExportTarget, Notecast, NotecastConfig, NotecastError, PageSize,
    PipelineProgressCallback, ProgressCallback, SessionId, Stage, VoiceConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while a stage runs; switches to a bar while notes are generated
/// chunk by chunk.
struct CliProgressCallback {
    bar: ProgressBar,
    stage_start: std::sync::Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            stage_start: std::sync::Mutex::new(None),
        })
    }

    fn elapsed(&self) -> String {
        let secs = self
            .stage_start
            .lock()
            .ok()
            .and_then(|s| *s)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        if let Ok(mut start) = self.stage_start.lock() {
            *start = Some(Instant::now());
        }
        self.bar.set_prefix(capitalise(&stage.to_string()));
        self.bar.set_message("working…");
    }

    fn on_chunk_start(&self, index: usize, total: usize) {
        if index == 0 && total > 1 {
            self.bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} chunks  ⏱ {elapsed_precise}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  ")
                .tick_strings(TICKS),
            );
            self.bar.set_length(total as u64);
            self.bar.set_position(0);
        }
        self.bar.set_message(format!("chunk {}/{}", index + 1, total));
    }

    fn on_chunk_complete(&self, index: usize, total: usize, notes_len: usize) {
        if total > 1 {
            self.bar.println(format!(
                "  {} Chunk {:>3}/{:<3}  {}",
                green("✓"),
                index + 1,
                total,
                dim(&format!("{notes_len:>5} chars")),
            ));
            self.bar.inc(1);
        }
    }

    fn on_stage_complete(&self, stage: Stage, output_len: usize) {
        self.bar.println(format!(
            "{} {:<22} {}  {}",
            green("✔"),
            capitalise(&stage.to_string()),
            dim(&format!("{output_len} {}", if stage == Stage::Audio { "bytes" } else { "chars" })),
            self.elapsed(),
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "{} {:<22} {}",
            red("✘"),
            capitalise(&stage.to_string()),
            red(&msg)
        ));
    }
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full run: notes, lecture script, audio, PDF and DOCX into ./study
  notecast lecture.pdf -o study

  # Notes and exports only (no speech key needed)
  notecast handout.docx --no-audio

  # Ask a question about a document
  notecast chapter.txt --ask "What is the Krebs cycle?"

  # Render an existing markdown file, no provider involved
  notecast notes.md --export-only -o out

  # Machine-readable payloads
  notecast lecture.pdf --no-audio --json

OUTPUT FILES:
  notes.md               formatted study notes
  lecture.txt            spoken lecture script
  lecture.mp3            synthesised lecture (extension follows --encoding)
  AI_Study_Notes.pdf     notes rendered for print
  AI_Study_Notes.docx    notes as a Word document

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  NOTECAST_LLM_PROVIDER   Override provider (gemini, openai, anthropic, ollama)
  NOTECAST_MODEL          Override model ID
  GOOGLE_TTS_API_KEY      Google Cloud Text-to-Speech API key
  PDFIUM_LIB_PATH         Directory or file of libpdfium for PDF uploads
"#;

/// Turn documents into study notes, lecture audio and printable exports.
#[derive(Parser, Debug)]
#[command(
    name = "notecast",
    version,
    about = "Turn documents into study notes, lecture audio and printable exports",
    long_about = "Extract text from a PDF, DOCX or TXT file, classify it, generate structured \
study notes with an LLM, rewrite them as a spoken lecture, synthesise the lecture to audio, and \
export the notes as PDF and DOCX.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input document (.pdf, .docx, .txt), or a markdown file with --export-only.
    input: PathBuf,

    /// Directory to write artifacts into.
    #[arg(short, long, env = "NOTECAST_OUTPUT", default_value = ".")]
    output: PathBuf,

    /// LLM model ID (e.g. gemini-2.0-flash, gpt-4.1-mini).
    #[arg(long, env = "NOTECAST_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "NOTECAST_LLM_PROVIDER")]
    provider: Option<String>,

    /// Maximum characters per note-generation chunk.
    #[arg(long, env = "NOTECAST_CHUNK_CHARS", default_value_t = 12_000)]
    chunk_chars: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "NOTECAST_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "NOTECAST_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Per-call provider timeout in seconds.
    #[arg(long, env = "NOTECAST_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Voice name for synthesis.
    #[arg(long, env = "NOTECAST_VOICE", default_value = "en-US-Neural2-D")]
    voice: String,

    /// Voice language code.
    #[arg(long, env = "NOTECAST_LANGUAGE", default_value = "en-US")]
    language: String,

    /// Page size for PDF/DOCX exports.
    #[arg(long, value_enum, default_value = "a4")]
    page_size: PageSizeArg,

    /// Omit "Page N of M" footers from the PDF.
    #[arg(long)]
    no_page_numbers: bool,

    /// Stop after notes and exports; skip lecture and audio.
    #[arg(long)]
    no_audio: bool,

    /// Treat the input as markdown and only render PDF/DOCX.
    #[arg(long)]
    export_only: bool,

    /// Answer a question about the document instead of generating artifacts.
    #[arg(long, value_name = "QUESTION")]
    ask: Option<String>,

    /// Print JSON payloads to stdout.
    #[arg(long, env = "NOTECAST_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "NOTECAST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "NOTECAST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "NOTECAST_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum PageSizeArg {
    A4,
    Letter,
}

impl From<PageSizeArg> for PageSize {
    fn from(v: PageSizeArg) -> Self {
        match v {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Letter => PageSize::Letter,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.export_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let export = ExportOptions {
        page_size: cli.page_size.clone().into(),
        page_numbers: !cli.no_page_numbers,
        ..ExportOptions::default()
    };

    // ── Export-only mode ─────────────────────────────────────────────────
    if cli.export_only {
        let md = tokio::fs::read_to_string(&cli.input)
            .await
            .with_context(|| format!("Failed to read {}", cli.input.display()))?;
        let tree = markdown::parse(&md);
        let mut written = Vec::new();
        for target in [ExportTarget::Pdf, ExportTarget::Docx] {
            let bytes = render(&tree, target, &export)
                .with_context(|| format!("{target} export failed"))?;
            let path = cli.output.join(target.file_name());
            write_atomic(&path, &bytes).await?;
            written.push(path);
        }
        report(&cli, &written);
        return Ok(());
    }

    // ── Build pipeline ───────────────────────────────────────────────────
    let progress = if show_progress {
        Some(CliProgressCallback::new())
    } else {
        None
    };
    let config = build_config(&cli, export, progress.clone().map(|p| p as ProgressCallback))?;
    let notecast = Notecast::from_config(config).context("Failed to set up the LLM provider")?;

    let receipt = notecast
        .upload_file(&cli.input)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    let id = receipt.session_id;

    let result = match cli.ask.as_deref() {
        Some(question) => answer(&notecast, id, question, &cli).await,
        None => run_pipeline(&notecast, id, &cli).await,
    };

    if let Some(p) = progress {
        p.finish();
    }
    result
}

/// Map CLI args to `NotecastConfig`.
fn build_config(
    cli: &Cli,
    export: ExportOptions,
    progress: Option<ProgressCallback>,
) -> Result<NotecastConfig> {
    let mut builder = NotecastConfig::builder()
        .max_chunk_chars(cli.chunk_chars)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .voice(VoiceConfig {
            language_code: cli.language.clone(),
            name: cli.voice.clone(),
            ..VoiceConfig::default()
        })
        .export(export);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn answer(notecast: &Notecast, id: SessionId, question: &str, cli: &Cli) -> Result<()> {
    let reply = notecast.ask(id, question).await.context("Question failed")?;
    if cli.json {
        println!("{}", json!({ "question": question, "answer": reply }));
    } else {
        println!("{reply}");
    }
    Ok(())
}

async fn run_pipeline(notecast: &Notecast, id: SessionId, cli: &Cli) -> Result<()> {
    let out = &cli.output;
    let mut written = Vec::new();
    let mut payloads = serde_json::Map::new();

    // ── Notes ────────────────────────────────────────────────────────────
    let notes = notecast
        .generate_notes(id)
        .await
        .context("Note generation failed")?;
    let path = out.join("notes.md");
    write_atomic(&path, format!("{}\n", notes.formatted_notes).as_bytes()).await?;
    written.push(path);
    payloads.insert("notes".into(), serde_json::to_value(&notes)?);

    // ── Exports ──────────────────────────────────────────────────────────
    for target in [ExportTarget::Pdf, ExportTarget::Docx] {
        let attachment = notecast
            .export(id, target)
            .await
            .with_context(|| format!("{target} export failed"))?;
        let path = out.join(&attachment.file_name);
        write_atomic(&path, &attachment.bytes).await?;
        written.push(path);
    }

    // ── Lecture + audio ──────────────────────────────────────────────────
    if !cli.no_audio {
        let manuscript = notecast
            .generate_manuscript(id)
            .await
            .context("Lecture generation failed")?;
        let path = out.join("lecture.txt");
        write_atomic(&path, format!("{}\n", manuscript.text).as_bytes()).await?;
        written.push(path);
        payloads.insert("manuscript".into(), serde_json::to_value(&manuscript)?);

        let audio = notecast
            .synthesize_audio(id)
            .await
            .context("Audio synthesis failed")?;
        let ext = notecast.config().voice.audio_encoding.extension();
        let path = out.join(format!("lecture.{ext}"));
        write_atomic(&path, &audio).await?;
        written.push(path);
    }

    if cli.json {
        payloads.insert("session".into(), serde_json::to_value(notecast.snapshot(id).await?)?);
        println!("{}", serde_json::to_string_pretty(&payloads)?);
    }
    report(cli, &written);
    Ok(())
}

/// Write to a temp file beside `path`, then rename over it.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), NotecastError> {
    let failed = |path: &Path, source: io::Error| NotecastError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| failed(parent, e))?;
    }
    let Some(name) = path.file_name() else {
        return Err(failed(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        ));
    };
    let tmp = path.with_file_name(format!(".{}.tmp", name.to_string_lossy()));
    tokio::fs::write(&tmp, bytes).await.map_err(|e| failed(tmp.as_path(), e))?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| failed(path, e))?;
    Ok(())
}

fn report(cli: &Cli, written: &[PathBuf]) {
    if cli.quiet || cli.json {
        return;
    }
    for path in written {
        eprintln!("{}  {}", green("→"), bold(&path.display().to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_atomic_creates_parents_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("notes.md");
        write_atomic(&path, b"# Notes\n").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"# Notes\n");
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn write_failure_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("plain-file");
        std::fs::write(&blocker, b"x").unwrap();

        let err = write_atomic(&blocker.join("notes.pdf"), b"data").await.unwrap_err();
        match err {
            NotecastError::OutputWriteFailed { path, .. } => assert_eq!(path, blocker),
            other => panic!("unexpected error: {other}"),
        }
    }
}
