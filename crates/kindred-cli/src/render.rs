use std::fmt::Write as _;

use kindred_core::card_stack::CardStack;
use kindred_core::card_stack::StackPhase;
use kindred_core::outcome::QuotaKey;
use kindred_core::outcome::QuotaLedger;
use kindred_core::transcript::Message;
use kindred_core::transcript::Role;
use kindred_core::SessionState;

const WRAP_WIDTH: usize = 72;

pub fn transcript(state: &SessionState) -> String {
    let mut out = String::new();
    let (before, after) = state.transcript.split_at_anchor();
    for message in before {
        message_block(&mut out, message);
    }
    if let Some(anchor) = state.transcript.anchor() {
        stack_block(&mut out, &anchor.stack, anchor.generation);
    }
    for message in after {
        message_block(&mut out, message);
    }
    out
}

fn message_block(out: &mut String, message: &Message) {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "kindred",
    };
    if let Some(quoted) = &message.quoted {
        let _ = writeln!(out, "  [about {}]", quoted.name);
    }
    if let Some(thinking) = message.thinking.as_deref().filter(|text| !text.is_empty()) {
        for line in wrap(thinking, WRAP_WIDTH) {
            let _ = writeln!(out, "  ~ {line}");
        }
    }
    let suffix = if message.is_streaming { " ..." } else { "" };
    let mut lines = wrap(&message.content, WRAP_WIDTH).into_iter();
    let first = lines.next().unwrap_or_default();
    let _ = writeln!(out, "{speaker:>8}> {first}{suffix}");
    for line in lines {
        let _ = writeln!(out, "          {line}");
    }
}

fn stack_block(out: &mut String, stack: &CardStack, generation: u64) {
    let _ = writeln!(
        out,
        "          +-- {} people (stack #{generation}, {}) --+",
        stack.len(),
        stack.phase().label()
    );
    let top = match stack.phase() {
        StackPhase::Idle(index) | StackPhase::Exiting { index, .. } => Some(index),
        StackPhase::Finished => None,
    };
    for (i, profile) in stack.profiles().iter().enumerate() {
        let marker = match top {
            Some(index) if index == i => '>',
            Some(index) if i < index => 'x',
            _ => ' ',
        };
        let _ = writeln!(
            out,
            "          {marker} {} ({}) receives left: {}",
            profile.name, profile.location, profile.receives_left
        );
        if Some(i) == top && !profile.why_match.is_empty() {
            for line in wrap(&profile.why_match, WRAP_WIDTH - 4) {
                let _ = writeln!(out, "              {line}");
            }
        }
    }
}

pub fn balances(state: &SessionState) -> String {
    let ledger = &state.outcomes.ledger;
    format!(
        "whispers: {}  credits: {}  contacts: {}  pending requests: {}",
        ledger.balance(&QuotaKey::Whispers),
        ledger.balance(&QuotaKey::Credits),
        state.outcomes.history.records().len(),
        state.outcomes.inbox.rows().len()
    )
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if !line.is_empty() && line.len() + 1 + word.len() > width {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn wrap_breaks_on_word_boundaries() {
        assert_eq!(
            wrap("one two three four", 9),
            vec!["one two".to_string(), "three".to_string(), "four".to_string()]
        );
        assert!(wrap("", 10).is_empty());
    }
}
