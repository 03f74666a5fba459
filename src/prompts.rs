//! Prompt templates for every generation stage.
//!
//! Centralising the wording here keeps it in one place and lets unit tests
//! inspect prompts directly without a live provider.
//!
//! Each builder puts a fixed instruction first and the document text last, so
//! the instruction is a stable prefix the tests (and the provider's prompt
//! cache) can rely on.

use crate::session::Category;

/// Instruction sent ahead of the document prefix during classification.
pub const CLASSIFY_INSTRUCTION: &str = r#"Please classify the following text as either "STEM" or "Language-based". Only reply with one word: STEM or LANGUAGE."#;

/// Note-formatting instruction for science, technology, engineering and medicine.
pub const STEM_NOTES_INSTRUCTION: &str = r###"You are a study note formatting assistant. Please convert the following technical document into clean, elegant, and highly readable study notes suitable for science and medical students.

Requirements:
- Base your notes STRICTLY on the text provided below.
- DO NOT use asterisks (*).
- Use proper markdown formatting.
- Use clear section headings (e.g. "## Investigations").
- Use indentation and bullet points with dashes (-) or numbered lists.
- Where appropriate, use tables (e.g. for classifications).
- Keep the style professional, clear, and logically grouped."###;

/// Note-formatting instruction for arts, humanities and language material.
pub const LANGUAGE_NOTES_INSTRUCTION: &str = r#"You are a study note formatting assistant. Please convert the following text into elegant, structured notes suitable for arts or language students.

Requirements:
- Base your notes STRICTLY on the text provided below.
- Use professional markdown formatting.
- Include headers, bullet points (- or numbers), and paragraph structure.
- Do NOT use asterisks.
- Keep it well-organized and easy to follow."#;

/// Neutral note-formatting instruction used when classification was inconclusive.
pub const GENERAL_NOTES_INSTRUCTION: &str = r#"You are a study note formatting assistant. Please convert the following content into clear, structured, and highly readable study notes.

Requirements:
- Base your notes STRICTLY on the text provided below.
- DO NOT invent or assume any content beyond what's in the text.
- Use professional markdown formatting.
- Use clear section headings (e.g., ## Overview).
- Use bullet points (-) or numbered lists for clarity.
- Avoid asterisks (*), emojis, or informal tone."#;

/// Instruction for turning notes into a spoken lecture. `{min}` and `{max}`
/// are replaced with the configured character band.
const LECTURE_INSTRUCTION: &str = r#"You are a university professor giving a concise spoken lecture to students.
Turn the following notes into a clear, natural-sounding lecture script.

- Stay within {min}-{max} characters (roughly 3-5 paragraphs).
- Use simple explanations, short sentences, and smooth transitions.
- Do NOT list bullet points, headings or tables. This should sound like a human talking.
- Output only the words to be spoken."#;

/// Instruction for answering questions about an uploaded document.
pub const ASK_INSTRUCTION: &str = r#"You are a helpful study assistant. Answer the student's question using only the document below. If the document does not contain the answer, say so plainly."#;

/// The note instruction for `category`.
pub fn notes_instruction(category: Category) -> &'static str {
    match category {
        Category::Stem => STEM_NOTES_INSTRUCTION,
        Category::Language => LANGUAGE_NOTES_INSTRUCTION,
        Category::Unknown => GENERAL_NOTES_INSTRUCTION,
    }
}

/// Build the classification prompt for a text prefix.
pub fn classification_prompt(prefix: &str) -> String {
    format!("{}\n\n{}", CLASSIFY_INSTRUCTION, prefix)
}

/// Build the note-generation prompt for one chunk.
pub fn notes_prompt(category: Category, chunk: &str) -> String {
    format!("{}\n\nInput Text:\n{}", notes_instruction(category), chunk)
}

/// Build the lecture prompt for a full set of notes.
pub fn lecture_prompt(notes: &str, min_chars: usize, max_chars: usize) -> String {
    let instruction = LECTURE_INSTRUCTION
        .replace("{min}", &min_chars.to_string())
        .replace("{max}", &max_chars.to_string());
    format!("{}\n\nHere are the notes:\n{}", instruction, notes)
}

/// Build a question-answering prompt over the document text.
pub fn ask_prompt(document: &str, question: &str) -> String {
    format!(
        "{}\n\nDocument:\n\"\"\"{}\"\"\"\n\nQuestion: {}",
        ASK_INSTRUCTION,
        document,
        question.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_category_has_distinct_instruction() {
        let stem = notes_instruction(Category::Stem);
        let lang = notes_instruction(Category::Language);
        let general = notes_instruction(Category::Unknown);
        assert_ne!(stem, lang);
        assert_ne!(stem, general);
        assert_ne!(lang, general);
    }

    #[test]
    fn notes_prompt_starts_with_instruction_and_ends_with_chunk() {
        let p = notes_prompt(Category::Stem, "Mitochondria make ATP.");
        assert!(p.starts_with(STEM_NOTES_INSTRUCTION));
        assert!(p.ends_with("Mitochondria make ATP."));
    }

    #[test]
    fn stem_instruction_keeps_heading_example() {
        assert!(STEM_NOTES_INSTRUCTION.contains("(e.g. \"## Investigations\")"));
        assert!(STEM_NOTES_INSTRUCTION.ends_with("logically grouped."));
    }

    #[test]
    fn lecture_prompt_carries_band() {
        let p = lecture_prompt("## Notes", 3000, 3500);
        assert!(p.contains("3000-3500 characters"));
        assert!(!p.contains("{min}"));
        assert!(p.ends_with("## Notes"));
    }

    #[test]
    fn classification_prompt_asks_for_one_word() {
        let p = classification_prompt("Photosynthesis");
        assert!(p.starts_with(CLASSIFY_INSTRUCTION));
        assert!(p.contains("STEM or LANGUAGE"));
    }
}
