pub mod llm_instructions;

use common::storage::types::turn::Turn;

/// Plain-text rendering of a run of turns for an LLM prompt, oldest first.
pub fn render_turns(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| format!("[{}] {}: {}", turn.channel, turn.author_name, turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Distinct channels touched by a run of turns, in first-seen order.
pub fn distinct_channels(turns: &[Turn]) -> Vec<String> {
    let mut seen = Vec::new();
    for turn in turns {
        if !seen.contains(&turn.channel) {
            seen.push(turn.channel.clone());
        }
    }
    seen
}
