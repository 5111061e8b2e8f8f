//! Frontmatter splitting for Markdown sources.
//!
//! A source file may open with a metadata block fenced by `---` lines:
//!
//! ```text
//! ---
//! url: /custom-b
//! published: 2024-01-01
//! ---
//! # Post title
//!
//! Body text.
//! ```
//!
//! The splitter walks the trimmed text line by line through three states:
//!
//! ```text
//! NoFrontmatter ──(first line is "---")──▶ InFrontmatter ──("---")──▶ Closed
//! ```
//!
//! - The opening fence must be the very first line, exactly `---`.
//! - The closing fence is the next line that is exactly `---`.
//! - Running out of input while still inside the block is an error.
//!
//! Anything else (no opening fence) means the whole trimmed text is content
//! and the metadata is empty.

use thiserror::Error;

const FENCE: &str = "---";

#[derive(Error, Debug, PartialEq)]
#[error("metadata block opened with `---` is never closed")]
pub struct UnclosedMetadata;

/// Result of splitting a source file into its metadata and content parts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Components {
    /// Text between the fences, trimmed. Empty when there is no block.
    pub metadata: String,
    /// Text after the closing fence (or the whole file), trimmed.
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    NoFrontmatter,
    InFrontmatter,
    Closed,
}

/// Split `source` into metadata and content.
pub fn split(source: &str) -> Result<Components, UnclosedMetadata> {
    let text = source.trim();
    let mut state = State::NoFrontmatter;
    let mut metadata: Vec<&str> = Vec::new();
    let mut lines = text.split_inclusive('\n');
    let mut consumed = 0usize;

    for line in lines.by_ref() {
        let bare = line.trim_end_matches(['\n', '\r']);
        match state {
            State::NoFrontmatter => {
                if bare != FENCE {
                    return Ok(Components {
                        metadata: String::new(),
                        content: text.to_string(),
                    });
                }
                state = State::InFrontmatter;
            }
            State::InFrontmatter => {
                if bare == FENCE {
                    state = State::Closed;
                } else {
                    metadata.push(bare);
                }
            }
            State::Closed => break,
        }
        consumed += line.len();
        if state == State::Closed {
            break;
        }
    }

    match state {
        State::Closed => Ok(Components {
            metadata: metadata.join("\n").trim().to_string(),
            content: text[consumed..].trim().to_string(),
        }),
        State::InFrontmatter => Err(UnclosedMetadata),
        // Empty input never leaves the initial state.
        State::NoFrontmatter => Ok(Components::default()),
    }
}
