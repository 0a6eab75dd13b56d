//! Context budget estimation and transcript compaction
//!
//! Token counts are a deliberately coarse chars/4 estimate, not a tokenizer.

use crate::ai::Message;

/// Messages preserved at the head: system prompt and original task
pub const HEAD_MESSAGES: usize = 2;
/// Most recent messages preserved by compaction
pub const TAIL_MESSAGES: usize = 6;
/// Recent messages kept when hard truncation is needed
pub const TRUNCATE_KEEP_RECENT: usize = 2;
/// At or below this length compaction is a no-op. An already compacted
/// transcript (head + placeholder + tail) sits exactly at this size.
pub const COMPACT_MIN_MESSAGES: usize = HEAD_MESSAGES + 1 + TAIL_MESSAGES;

const CHARS_PER_TOKEN: usize = 4;

/// Estimate tokens for a single text
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

/// Estimated tokens for a whole transcript
pub fn estimate_transcript_tokens(messages: &[Message]) -> usize {
    messages.iter().map(|m| estimate_tokens(&m.content)).sum()
}

/// Fraction of `context_limit` the transcript is estimated to use.
/// A zero limit yields zero rather than dividing by zero.
pub fn estimate_utilization(messages: &[Message], context_limit: usize) -> f64 {
    if context_limit == 0 {
        return 0.0;
    }
    estimate_transcript_tokens(messages) as f64 / context_limit as f64
}

/// Replace the middle of the transcript with a single placeholder.
///
/// The first two messages and the last six are kept verbatim. Returns the
/// number of elided messages (zero when the transcript is too short).
pub fn compact(messages: &mut Vec<Message>) -> usize {
    if messages.len() <= COMPACT_MIN_MESSAGES {
        return 0;
    }

    let middle_end = messages.len() - TAIL_MESSAGES;
    let elided = middle_end - HEAD_MESSAGES;
    let placeholder = Message::system(format!(
        "[Context compacted: {} earlier turns were elided to stay within the context window. \
         The original task and the most recent turns are preserved.]",
        elided
    ));
    messages.splice(HEAD_MESSAGES..middle_end, std::iter::once(placeholder));

    log::warn!(
        "[CONTEXT] Compacted transcript: elided {} turns, {} remain",
        elided,
        messages.len()
    );
    elided
}

/// Keep only the system prompt, the original task and the most recent turns
pub fn truncate_to_recent(messages: &mut Vec<Message>, keep_recent: usize) -> usize {
    let keep = HEAD_MESSAGES + keep_recent;
    if messages.len() <= keep {
        return 0;
    }
    let removed = messages.len() - keep;
    messages.drain(HEAD_MESSAGES..messages.len() - keep_recent);
    log::warn!("[CONTEXT] Truncated transcript: dropped {} oldest turns", removed);
    removed
}

/// Format an integer with thousands separators, e.g. 128000 -> "128,000"
pub fn format_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(len: usize) -> Vec<Message> {
        let mut messages = vec![Message::system("system prompt"), Message::user("original task")];
        for i in 2..len {
            if i % 2 == 0 {
                messages.push(Message::assistant(format!("answer {}", i)));
            } else {
                messages.push(Message::user(format!("feedback {}", i)));
            }
        }
        messages
    }

    #[test]
    fn test_estimate_utilization() {
        let messages = vec![Message::system("a".repeat(400)), Message::user("b".repeat(400))];
        assert_eq!(estimate_transcript_tokens(&messages), 200);
        assert_eq!(estimate_utilization(&messages, 1000), 0.2);
        assert_eq!(estimate_utilization(&messages, 0), 0.0);
    }

    #[test]
    fn test_compact_short_is_noop() {
        let mut messages = transcript(COMPACT_MIN_MESSAGES);
        let before = messages.clone();
        assert_eq!(compact(&mut messages), 0);
        assert_eq!(messages, before);
    }

    #[test]
    fn test_compact_preserves_head_and_tail() {
        let original = transcript(20);
        let mut messages = original.clone();

        assert_eq!(compact(&mut messages), 12);
        assert_eq!(messages.len(), COMPACT_MIN_MESSAGES);
        assert_eq!(messages[..2], original[..2]);
        assert_eq!(messages[3..], original[14..]);
        assert!(messages[2].content.contains("12 earlier turns"));
    }

    #[test]
    fn test_compact_is_idempotent() {
        let mut messages = transcript(15);
        compact(&mut messages);
        let once = messages.clone();
        assert_eq!(compact(&mut messages), 0);
        assert_eq!(messages, once);
    }

    #[test]
    fn test_truncate_to_recent() {
        let original = transcript(10);
        let mut messages = original.clone();
        assert_eq!(truncate_to_recent(&mut messages, TRUNCATE_KEEP_RECENT), 6);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[..2], original[..2]);
        assert_eq!(messages[2..], original[8..]);

        let mut short = transcript(3);
        assert_eq!(truncate_to_recent(&mut short, TRUNCATE_KEEP_RECENT), 0);
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(128_000), "128,000");
        assert_eq!(format_thousands(1_234_567), "1,234,567");
    }
}
