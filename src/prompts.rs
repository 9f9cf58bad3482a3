//! System prompts for the page-to-Markdown inference calls.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the default behaviour (e.g.
//!    tweaking the restructuring rules) requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompt composition directly
//!    without spinning up a real VLM.
//!
//! Callers override the defaults via [`crate::config::PromptConfig`]; the
//! constants here are used only when no override is provided.

use crate::config::PromptConfig;

/// Default system prompt for restructuring a page image into Markdown notes.
///
/// Used when no [`PromptConfig`] override is supplied.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a content-architecture expert. Analyse the content of the image and:

1. UNDERSTAND, DON'T TRANSCRIBE
   - Do not perform OCR-style transcription; reconstruct the logical
     relationships (parallel, hierarchical, causal) between the concepts shown

2. STRUCTURED OUTPUT
   - Use Markdown heading levels (#/##/###) and lists to express structure

3. LOGICAL REPAIR
   - Silently correct sentences that are clearly garbled by OCR-like artefacts

4. EMPHASIS
   - Identify underlined, highlighted, and hand-annotated key content and mark
     it in the output

5. FORMATTING CONVENTIONS
   - Section titles use ##
   - Concept levels use ###
   - Key points use **bold**
   - Logical relations are expressed with `->` arrows or indentation

OUTPUT REQUIREMENTS: do not invent or drop content from the image; respect the
original text. Return Markdown directly — no code-fence wrapping, no
explanatory preamble."#;

/// Default output-format exemplar appended to the system prompt.
pub const DEFAULT_FORMAT_EXAMPLE: &str = r#"## Chapter 1 Concepts

### 1.1 Definition
**Key concept**: refers to...

### 1.2 Characteristics
- Characteristic one: ...
- Characteristic two: ...

### 1.3 Relations
Concept A -> Concept B -> Concept C"#;

/// Fixed user-turn instruction accompanying the page image.
///
/// The VLM API requires a user turn to respond to; the image carries the
/// actual content.
pub const USER_INSTRUCTION: &str = "Extract and restructure the content of this page:";

/// Compose the effective system prompt from a prompt configuration.
///
/// When a format exemplar is present it is appended inside a fenced block so
/// the model treats it as a shape to imitate, not content to copy.
pub fn compose_system_prompt(config: &PromptConfig) -> String {
    match config.format_example {
        Some(ref example) if !example.trim().is_empty() => format!(
            "{}\n\nFollow this format example strictly:\n```{}```",
            config.prompt, example
        ),
        _ => config.prompt.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_without_example_is_prompt_verbatim() {
        let cfg = PromptConfig {
            prompt: "Describe the page.".into(),
            format_example: None,
        };
        assert_eq!(compose_system_prompt(&cfg), "Describe the page.");
    }

    #[test]
    fn compose_with_example_appends_fenced_block() {
        let cfg = PromptConfig {
            prompt: "Describe the page.".into(),
            format_example: Some("## Heading".into()),
        };
        let composed = compose_system_prompt(&cfg);
        assert!(composed.starts_with("Describe the page."));
        assert!(composed.contains("```## Heading```"));
    }

    #[test]
    fn blank_example_is_ignored() {
        let cfg = PromptConfig {
            prompt: "P".into(),
            format_example: Some("   ".into()),
        };
        assert_eq!(compose_system_prompt(&cfg), "P");
    }

    #[test]
    fn default_prompt_forbids_fences() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("no code-fence wrapping"));
    }
}
