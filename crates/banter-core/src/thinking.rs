//! Splitting inline `<think>` reasoning blocks out of model output.
//!
//! Some models emit their chain of thought inline, wrapped in
//! `<think>...</think>` markers, ahead of the user-facing answer. The
//! renderer routes the two segments to separate channels, so the split
//! has to happen before any text reaches the terminal.

/// Result of [`split_thinking`]. `reasoning` is `None` when the input had
/// no think block or the block was empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkingSplit {
    pub reasoning: Option<String>,
    pub display: String,
}

/// Splits `text` into a reasoning segment and a display segment.
///
/// The reasoning span runs from the last `<think>` marker to the first
/// `</think>` after it, which keeps nested or repeated open markers from
/// swallowing the answer. Without any open marker the whole input is
/// display text. An open marker with no close means the block never
/// terminated, so neither segment is produced from the fragment.
/// Both segments are trimmed of surrounding whitespace.
pub fn split_thinking(text: &str) -> ThinkingSplit {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let Some(open_at) = text.rfind(OPEN) else {
        return ThinkingSplit {
            reasoning: None,
            display: text.trim().to_string(),
        };
    };
    let after_open = &text[open_at + OPEN.len()..];
    let Some(close_at) = after_open.find(CLOSE) else {
        return ThinkingSplit {
            reasoning: None,
            display: String::new(),
        };
    };
    let reasoning = after_open[..close_at].trim();
    let display = after_open[close_at + CLOSE.len()..].trim();
    ThinkingSplit {
        reasoning: (!reasoning.is_empty()).then(|| reasoning.to_string()),
        display: display.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_reasoning_and_display() {
        let split = split_thinking("<think>considering options</think>Hello there");
        assert_eq!(split.reasoning.as_deref(), Some("considering options"));
        assert_eq!(split.display, "Hello there");
    }

    #[test]
    fn test_empty_block_yields_no_reasoning() {
        let split = split_thinking("<think></think>");
        assert_eq!(split.reasoning, None);
        assert_eq!(split.display, "");
    }

    #[test]
    fn test_whitespace_only_block_yields_no_reasoning() {
        let split = split_thinking("<think>   </think>fine");
        assert_eq!(split.reasoning, None);
        assert_eq!(split.display, "fine");
    }

    #[test]
    fn test_plain_text_passes_through() {
        let split = split_thinking("just an answer");
        assert_eq!(split.reasoning, None);
        assert_eq!(split.display, "just an answer");
    }

    #[test]
    fn test_unterminated_block_produces_nothing() {
        let split = split_thinking("<think>still going");
        assert_eq!(split.reasoning, None);
        assert_eq!(split.display, "");
    }

    #[test]
    fn test_last_open_marker_wins() {
        let split = split_thinking("<think>outer<think>inner</think>answer");
        assert_eq!(split.reasoning.as_deref(), Some("inner"));
        assert_eq!(split.display, "answer");
    }

    #[test]
    fn test_segments_are_trimmed() {
        let split = split_thinking("  <think> pondering </think>  result  ");
        assert_eq!(split.reasoning.as_deref(), Some("pondering"));
        assert_eq!(split.display, "result");
    }
}
