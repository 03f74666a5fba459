//! Building blocks the orchestrator sequences.
//!
//! Each submodule is one concern and is testable on its own. The two
//! capabilities that leave the process ([`llm`] and [`speech`]) sit behind
//! traits so tests can script them and hosts can swap providers.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ chunk ──▶ llm (per chunk) ──▶ tidy ──▶ llm (lecture) ──▶ tidy::speech_text ──▶ speech
//! (bytes)    (paras)   (notes)             (clean)  (manuscript)      (plain prose)          (audio)
//! ```
//!
//! 1. [`extract`] — decode PDF / DOCX / TXT uploads to text
//! 2. [`chunk`]   — split text at paragraph delimiters into bounded chunks
//! 3. [`llm`]     — the content-transform capability and its default provider
//! 4. [`tidy`]    — deterministic cleanup of generated markdown and prose
//! 5. [`speech`]  — the speech-synthesis capability and its default provider

pub mod chunk;
pub mod extract;
pub mod llm;
pub mod speech;
pub mod tidy;
