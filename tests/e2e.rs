//! End-to-end tests for the notecast pipeline.
//!
//! Most tests drive [`Notecast`] with scripted in-memory capabilities, so
//! they are deterministic and need no network. The final test makes live
//! provider calls and is gated behind the `E2E_ENABLED` environment variable.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture
//!
//! Live test:
//!   E2E_ENABLED=1 GEMINI_API_KEY=... cargo test --test e2e live -- --nocapture

use async_trait::async_trait;
use notecast::{
    markdown, render, Block, Category, ContentGenerator, ExportOptions, ExportTarget, Notecast,
    NotecastConfig, NotecastError, PipelineProgressCallback, ProviderError, SessionState,
    SpeechSynthesizer, Stage, VoiceConfig,
};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Content generator that answers from a script and records every prompt.
///
/// Each entry is matched against the prompt: the first entry whose needle
/// occurs in the prompt (or the first entry with an empty needle) answers.
#[derive(Default)]
struct ScriptedGenerator {
    replies: Mutex<Vec<(String, Result<String, ProviderError>)>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reply `answer` to the next prompt containing `needle`.
    fn on(self: &Arc<Self>, needle: &str, answer: Result<&str, ProviderError>) -> Arc<Self> {
        self.replies
            .lock()
            .unwrap()
            .push((needle.to_string(), answer.map(str::to_string)));
        Arc::clone(self)
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn calls_containing(&self, needle: &str) -> usize {
        self.prompts().iter().filter(|p| p.contains(needle)).count()
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut replies = self.replies.lock().unwrap();
        let pos = replies
            .iter()
            .position(|(needle, _)| needle.is_empty() || prompt.contains(needle.as_str()));
        match pos {
            Some(i) => replies.remove(i).1,
            None => Err(ProviderError::Failed {
                detail: "no scripted reply".into(),
            }),
        }
    }
}

/// Synthesizer that returns a fixed byte string and records its input.
#[derive(Default)]
struct FakeSpeech {
    texts: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str, _voice: &VoiceConfig) -> Result<Vec<u8>, ProviderError> {
        self.texts.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(ProviderError::Http {
                status: 403,
                body: "forbidden".into(),
            });
        }
        Ok(b"ID3-fake-mp3".to_vec())
    }
}

#[derive(Default)]
struct StageLog(Mutex<Vec<String>>);

impl PipelineProgressCallback for StageLog {
    fn on_stage_start(&self, stage: Stage) {
        self.0.lock().unwrap().push(format!("start {stage:?}"));
    }
    fn on_chunk_complete(&self, index: usize, total: usize, _notes_len: usize) {
        self.0.lock().unwrap().push(format!("chunk {}/{}", index + 1, total));
    }
    fn on_stage_complete(&self, stage: Stage, _output_len: usize) {
        self.0.lock().unwrap().push(format!("done {stage:?}"));
    }
    fn on_stage_error(&self, stage: Stage, _error: &str) {
        self.0.lock().unwrap().push(format!("error {stage:?}"));
    }
}

const CLASSIFY: &str = "STEM\" or \"Language-based\"";
const STEM_NOTES: &str = "suitable for science and medical students";
const LECTURE: &str = "spoken lecture";

fn config(max_chunk_chars: usize) -> NotecastConfig {
    NotecastConfig::builder()
        .max_chunk_chars(max_chunk_chars)
        .build()
        .unwrap()
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_pipeline_produces_every_artifact() {
    let generator = ScriptedGenerator::new()
        .on(CLASSIFY, Ok("stem\n"))
        .on(STEM_NOTES, Ok("## Para\n\n- one\n- two"))
        .on(LECTURE, Ok("Today we look at paragraphs."));
    let speech = Arc::new(FakeSpeech::default());
    let notecast = Notecast::new(config(100), generator.clone()).with_synthesizer(speech.clone());

    let id = notecast
        .upload_text("Para one.\n\nPara two.", Some("intro.txt".into()))
        .await
        .unwrap()
        .session_id;

    let notes = notecast.generate_notes(id).await.unwrap();
    assert_eq!(notes.category, Category::Stem);
    assert_eq!(notes.formatted_notes, "## Para\n\n- one\n- two");

    // One chunk: both paragraphs fit in 100 chars.
    assert_eq!(generator.calls_containing(STEM_NOTES), 1);
    let notes_prompt = generator
        .prompts()
        .into_iter()
        .find(|p| p.contains(STEM_NOTES))
        .unwrap();
    assert!(notes_prompt.starts_with("You are a study note formatting assistant"));
    assert!(notes_prompt.ends_with("Para one.\n\nPara two."));

    let audio = notecast.generate_audio(id).await.unwrap();
    assert!(!audio.audio_base64.is_empty());
    assert_eq!(generator.calls_containing(LECTURE), 1);
    assert_eq!(
        speech.texts.lock().unwrap().as_slice(),
        ["Today we look at paragraphs."]
    );

    let pdf = notecast.export(id, ExportTarget::Pdf).await.unwrap();
    assert_eq!(pdf.content_type, "application/pdf");
    assert_eq!(pdf.file_name, "AI_Study_Notes.pdf");
    assert!(pdf.bytes.starts_with(b"%PDF-"));

    let snapshot = notecast.snapshot(id).await.unwrap();
    assert_eq!(snapshot.state, SessionState::AudioReady);
    assert_eq!(snapshot.source_name.as_deref(), Some("intro.txt"));
}

#[tokio::test]
async fn notes_failure_on_later_chunk_commits_nothing() {
    // Three paragraphs of 30 chars with a limit of 40 → three chunks.
    let text = ["a".repeat(30), "b".repeat(30), "c".repeat(30)].join("\n\n");
    let generator = ScriptedGenerator::new()
        .on(CLASSIFY, Ok("STEM"))
        .on("aaaa", Ok("notes A"))
        .on(
            "bbbb",
            Err(ProviderError::Failed {
                detail: "quota exceeded".into(),
            }),
        );
    let log = Arc::new(StageLog::default());
    let config = NotecastConfig::builder()
        .max_chunk_chars(40)
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let notecast = Notecast::new(config, generator.clone());
    let id = notecast.upload_text(&text, None).await.unwrap().session_id;

    let err = notecast.generate_notes(id).await.unwrap_err();
    match err {
        NotecastError::StageFailed { stage, ref source } => {
            assert_eq!(stage, Stage::Notes);
            assert!(source.to_string().contains("quota exceeded"));
        }
        other => panic!("expected StageFailed, got {other:?}"),
    }

    // The third chunk was never sent for notes.
    let third_chunk_calls = generator
        .prompts()
        .iter()
        .filter(|p| p.contains(STEM_NOTES) && p.ends_with("cccc"))
        .count();
    assert_eq!(third_chunk_calls, 0);
    assert_eq!(generator.calls_containing(STEM_NOTES), 2);

    let snapshot = notecast.snapshot(id).await.unwrap();
    assert_eq!(snapshot.state, SessionState::Classified);
    assert_eq!(snapshot.notes_chars, None);
    assert_eq!(snapshot.raw_chars, text.chars().count());

    assert_eq!(
        log.0.lock().unwrap().as_slice(),
        [
            "start Classify",
            "done Classify",
            "start Notes",
            "chunk 1/3",
            "error Notes"
        ]
    );
}

#[tokio::test]
async fn failed_regeneration_keeps_previous_notes() {
    let generator = ScriptedGenerator::new()
        .on(CLASSIFY, Ok("LANGUAGE"))
        .on("arts or language students", Ok("## First"))
        .on("arts or language students", Err(ProviderError::Timeout { secs: 5 }));
    let notecast = Notecast::new(config(1000), generator);
    let id = notecast.upload_text("Some poem.", None).await.unwrap().session_id;

    notecast.classify(id).await.unwrap();
    notecast.write_notes(id).await.unwrap();
    let err = notecast.write_notes(id).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Notes));

    assert_eq!(notecast.notes(id).await.unwrap().as_deref(), Some("## First"));
}

#[tokio::test]
async fn failed_multi_chunk_regeneration_keeps_every_artifact() {
    // Three chunks; the second run fails on the second chunk.
    let text = ["a".repeat(30), "b".repeat(30), "c".repeat(30)].join("\n\n");
    let generator = ScriptedGenerator::new()
        .on(CLASSIFY, Ok("STEM"))
        .on("aaaa", Ok("notes A"))
        .on("bbbb", Ok("notes B"))
        .on("cccc", Ok("notes C"))
        .on(LECTURE, Ok("Good morning."))
        .on("aaaa", Ok("notes A, second draft"))
        .on("bbbb", Err(ProviderError::EmptyResponse));
    let notecast = Notecast::new(config(40), generator.clone());
    let id = notecast.upload_text(&text, None).await.unwrap().session_id;

    notecast.generate_notes(id).await.unwrap();
    notecast.generate_manuscript(id).await.unwrap();

    let err = notecast.write_notes(id).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Notes));

    assert_eq!(
        notecast.notes(id).await.unwrap().as_deref(),
        Some("notes A\n\nnotes B\n\nnotes C")
    );
    let snapshot = notecast.snapshot(id).await.unwrap();
    assert_eq!(snapshot.state, SessionState::ManuscriptReady);
    assert_eq!(snapshot.manuscript_chars, Some("Good morning.".len()));

    // The third chunk went out once, in the first run only.
    let third_chunk_calls = generator
        .prompts()
        .iter()
        .filter(|p| p.contains(STEM_NOTES) && p.ends_with("cccc"))
        .count();
    assert_eq!(third_chunk_calls, 1);
}

#[tokio::test]
async fn chunk_that_tidies_to_nothing_fails_notes() {
    let generator = ScriptedGenerator::new()
        .on(CLASSIFY, Ok("STEM"))
        .on(STEM_NOTES, Ok("```markdown\n\n```"));
    let log = Arc::new(StageLog::default());
    let config = NotecastConfig::builder()
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let notecast = Notecast::new(config, generator);
    let id = notecast.upload_text("Enzymes.", None).await.unwrap().session_id;

    let err = notecast.generate_notes(id).await.unwrap_err();
    assert!(
        matches!(
            err,
            NotecastError::StageFailed {
                stage: Stage::Notes,
                source: ProviderError::EmptyResponse
            }
        ),
        "got {err:?}"
    );
    let snapshot = notecast.snapshot(id).await.unwrap();
    assert_eq!(snapshot.state, SessionState::Classified);
    assert_eq!(snapshot.notes_chars, None);
    assert_eq!(log.0.lock().unwrap().last().map(String::as_str), Some("error Notes"));
}

#[derive(Default)]
struct LengthLog(Mutex<Vec<(Stage, usize)>>);

impl PipelineProgressCallback for LengthLog {
    fn on_stage_complete(&self, stage: Stage, output_len: usize) {
        self.0.lock().unwrap().push((stage, output_len));
    }
}

#[tokio::test]
async fn completion_lengths_count_characters_and_audio_bytes() {
    let generator = ScriptedGenerator::new()
        .on(CLASSIFY, Ok("stem\n"))
        .on(STEM_NOTES, Ok("## Café"))
        .on(LECTURE, Ok("Voilà, café."));
    let log = Arc::new(LengthLog::default());
    let config = NotecastConfig::builder()
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let notecast = Notecast::new(config, generator)
        .with_synthesizer(Arc::new(FakeSpeech::default()));
    let id = notecast.upload_text("Coffee chemistry.", None).await.unwrap().session_id;

    notecast.generate_notes(id).await.unwrap();
    notecast.generate_audio(id).await.unwrap();

    assert_eq!(
        log.0.lock().unwrap().as_slice(),
        [
            (Stage::Classify, 5),
            (Stage::Notes, 7),
            (Stage::Manuscript, 12),
            (Stage::Audio, b"ID3-fake-mp3".len()),
        ]
    );
}

#[tokio::test]
async fn manuscript_before_notes_is_rejected() {
    let generator = ScriptedGenerator::new().on(CLASSIFY, Ok("STEM"));
    let notecast = Notecast::new(config(1000), generator.clone());
    let id = notecast.upload_text("Text.", None).await.unwrap().session_id;
    notecast.classify(id).await.unwrap();

    let err = notecast.generate_manuscript(id).await.unwrap_err();
    assert!(
        matches!(
            err,
            NotecastError::PreconditionNotMet {
                stage: Stage::Manuscript,
                missing: "notes"
            }
        ),
        "got {err:?}"
    );
    assert_eq!(generator.calls_containing(LECTURE), 0);
    let snapshot = notecast.snapshot(id).await.unwrap();
    assert_eq!(snapshot.manuscript_chars, None);
}

#[tokio::test]
async fn audio_before_manuscript_is_rejected() {
    let generator = ScriptedGenerator::new();
    let notecast = Notecast::new(config(1000), generator)
        .with_synthesizer(Arc::new(FakeSpeech::default()));
    let id = notecast.upload_text("Text.", None).await.unwrap().session_id;

    let err = notecast.synthesize_audio(id).await.unwrap_err();
    assert!(matches!(
        err,
        NotecastError::PreconditionNotMet {
            stage: Stage::Audio,
            ..
        }
    ));
}

#[tokio::test]
async fn classification_is_idempotent() {
    let generator = ScriptedGenerator::new()
        .on(CLASSIFY, Ok("LANGUAGE"))
        .on(CLASSIFY, Ok("LANGUAGE"));
    let notecast = Notecast::new(config(1000), generator);
    let id = notecast.upload_text("Bonjour.", None).await.unwrap().session_id;

    let first = notecast.classify(id).await.unwrap();
    let second = notecast.classify(id).await.unwrap();
    assert_eq!(first, Category::Language);
    assert_eq!(first, second);
}

#[tokio::test]
async fn unrecognised_classification_uses_general_notes() {
    let generator = ScriptedGenerator::new()
        .on(CLASSIFY, Ok("Language-based"))
        .on("Input Text:", Ok("## Overview"));
    let notecast = Notecast::new(config(1000), generator.clone());
    let id = notecast.upload_text("Mixed.", None).await.unwrap().session_id;

    let notes = notecast.generate_notes(id).await.unwrap();
    assert_eq!(notes.category, Category::Unknown);
    assert_eq!(generator.calls_containing(STEM_NOTES), 0);
    assert_eq!(generator.calls_containing("arts or language students"), 0);
    assert_eq!(generator.calls_containing("Input Text:"), 1);
}

#[tokio::test]
async fn reclassifying_clears_downstream_artifacts() {
    let generator = ScriptedGenerator::new()
        .on(CLASSIFY, Ok("STEM"))
        .on(STEM_NOTES, Ok("## Notes"))
        .on(CLASSIFY, Ok("LANGUAGE"));
    let notecast = Notecast::new(config(1000), generator);
    let id = notecast.upload_text("Cells.", None).await.unwrap().session_id;
    notecast.generate_notes(id).await.unwrap();

    notecast.classify(id).await.unwrap();
    let snapshot = notecast.snapshot(id).await.unwrap();
    assert_eq!(snapshot.state, SessionState::Classified);
    assert_eq!(snapshot.category, Some(Category::Language));
    assert_eq!(snapshot.notes_chars, None);
}

#[tokio::test]
async fn audio_failure_keeps_manuscript() {
    let generator = ScriptedGenerator::new()
        .on(CLASSIFY, Ok("STEM"))
        .on(STEM_NOTES, Ok("## Notes"))
        .on(LECTURE, Ok("A short talk."));
    let speech = Arc::new(FakeSpeech {
        fail: true,
        ..FakeSpeech::default()
    });
    let notecast = Notecast::new(config(1000), generator).with_synthesizer(speech);
    let id = notecast.upload_text("Atoms.", None).await.unwrap().session_id;
    notecast.generate_notes(id).await.unwrap();

    let err = notecast.generate_audio(id).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Audio));
    assert!(err.to_string().contains("HTTP 403"));

    let snapshot = notecast.snapshot(id).await.unwrap();
    assert_eq!(snapshot.state, SessionState::ManuscriptReady);
    assert_eq!(snapshot.audio_bytes, None);
}

#[tokio::test]
async fn manuscript_outside_band_is_kept_and_reported() {
    let generator = ScriptedGenerator::new()
        .on(CLASSIFY, Ok("STEM"))
        .on(STEM_NOTES, Ok("## Notes"))
        .on(LECTURE, Ok("Too short."));
    let notecast = Notecast::new(config(1000), generator);
    let id = notecast.upload_text("Atoms.", None).await.unwrap().session_id;
    notecast.generate_notes(id).await.unwrap();

    let manuscript = notecast.generate_manuscript(id).await.unwrap();
    assert_eq!(manuscript.text, "Too short.");
    assert_eq!(manuscript.chars, 10);
    assert!(!manuscript.within_band);
}

#[tokio::test]
async fn speech_receives_plain_prose() {
    let generator = ScriptedGenerator::new()
        .on(CLASSIFY, Ok("STEM"))
        .on(STEM_NOTES, Ok("## Notes"))
        .on(LECTURE, Ok("## Welcome\n\nToday is **important**."));
    let speech = Arc::new(FakeSpeech::default());
    let notecast = Notecast::new(config(1000), generator).with_synthesizer(speech.clone());
    let id = notecast.upload_text("Atoms.", None).await.unwrap().session_id;
    notecast.generate_notes(id).await.unwrap();
    notecast.generate_audio(id).await.unwrap();

    let spoken = speech.texts.lock().unwrap()[0].clone();
    assert!(!spoken.contains('#'), "got {spoken:?}");
    assert!(!spoken.contains("**"), "got {spoken:?}");
    assert!(spoken.contains("Today is important."));
}

#[tokio::test]
async fn export_requires_notes() {
    let notecast = Notecast::new(config(1000), ScriptedGenerator::new());
    let id = notecast.upload_text("Text.", None).await.unwrap().session_id;
    let err = notecast.export(id, ExportTarget::Docx).await.unwrap_err();
    assert!(matches!(err, NotecastError::NotesMissing));
}

#[tokio::test]
async fn ask_answers_without_touching_session() {
    let generator = ScriptedGenerator::new().on("Question: What is ATP?", Ok("  Energy currency.  "));
    let notecast = Notecast::new(config(1000), generator.clone());
    let id = notecast
        .upload_text("ATP is the energy currency of the cell.", None)
        .await
        .unwrap()
        .session_id;

    let answer = notecast.ask(id, "What is ATP?").await.unwrap();
    assert_eq!(answer, "Energy currency.");
    assert!(generator.prompts()[0].contains("ATP is the energy currency of the cell."));
    assert_eq!(
        notecast.snapshot(id).await.unwrap().state,
        SessionState::Extracted
    );
}

#[tokio::test]
async fn sessions_are_independent() {
    let generator = ScriptedGenerator::new()
        .on("first document", Ok("STEM"))
        .on("second document", Ok("LANGUAGE"));
    let notecast = Arc::new(Notecast::new(config(1000), generator));
    let a = notecast.upload_text("first document", None).await.unwrap().session_id;
    let b = notecast.upload_text("second document", None).await.unwrap().session_id;

    let (ca, cb) = futures::join!(notecast.classify(a), notecast.classify(b));
    assert_eq!(ca.unwrap(), Category::Stem);
    assert_eq!(cb.unwrap(), Category::Language);

    assert!(notecast.remove(a).await);
    assert!(matches!(
        notecast.snapshot(a).await.unwrap_err(),
        NotecastError::SessionNotFound { .. }
    ));
    assert!(notecast.snapshot(b).await.is_ok());
}

#[tokio::test]
async fn unsupported_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slides.pptx");
    std::fs::write(&path, b"not really").unwrap();

    let notecast = Notecast::new(config(1000), ScriptedGenerator::new());
    let err = notecast.upload_file(&path).await.unwrap_err();
    assert!(matches!(err, NotecastError::UnsupportedFormat { .. }));

    let missing = dir.path().join("gone.txt");
    let err = notecast.upload_file(&missing).await.unwrap_err();
    assert!(matches!(err, NotecastError::FileNotFound { .. }));
}

#[tokio::test]
async fn text_file_upload_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Chapter.TXT");
    std::fs::write(&path, "Line one\r\n\r\nLine two").unwrap();

    let notecast = Notecast::new(config(1000), ScriptedGenerator::new());
    let receipt = notecast.upload_file(&path).await.unwrap();
    let snapshot = notecast.snapshot(receipt.session_id).await.unwrap();
    assert_eq!(snapshot.raw_chars, "Line one\n\nLine two".len());
    assert_eq!(snapshot.source_name.as_deref(), Some("Chapter.TXT"));
}

// ── Exporter structure ───────────────────────────────────────────────────────

#[test]
fn exporter_structure() {
    let md = "## Cell Biology\n\nCells are the unit of life.\n\n- Nucleus\n- Ribosome\n- Membrane\n\n| Organelle | Role |\n|---|---|\n| Nucleus | DNA |";
    let tree = markdown::parse(md);
    assert_eq!(
        tree.blocks,
        vec![
            Block::Heading {
                level: 2,
                text: "Cell Biology".into()
            },
            Block::Paragraph {
                text: "Cells are the unit of life.".into()
            },
            Block::List {
                items: vec!["Nucleus".into(), "Ribosome".into(), "Membrane".into()],
                ordered: false
            },
            Block::Table {
                rows: vec![
                    vec!["Organelle".into(), "Role".into()],
                    vec!["Nucleus".into(), "DNA".into()],
                ]
            },
        ]
    );

    for target in [ExportTarget::Pdf, ExportTarget::Docx] {
        let bytes = render(&tree, target, &ExportOptions::default()).unwrap();
        assert!(!bytes.is_empty(), "{target} renderer produced nothing");
    }
}

// ── Live ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn live_notes_and_export() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run live tests");
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("notecast=debug"))
        .with_test_writer()
        .try_init();
    let notecast = Notecast::from_config(NotecastConfig::default()).expect("provider configured");
    let id = notecast
        .upload_text(
            "Photosynthesis converts light energy into chemical energy.\n\n\
             It takes place in the chloroplasts of plant cells.",
            None,
        )
        .await
        .unwrap()
        .session_id;

    let notes = notecast.generate_notes(id).await.unwrap();
    println!("[{}]\n{}", notes.category, notes.formatted_notes);
    assert!(!notes.formatted_notes.trim().is_empty());

    let docx = notecast.export(id, ExportTarget::Docx).await.unwrap();
    assert!(docx.bytes.starts_with(b"PK"));
}
