//! Interactive analysis of a digest against a hosted chat model.
//!
//! The session only holds state: the model keeps no memory of its own, so
//! every call carries the retained turn history.

use crate::compactor::{truncate_chars, DEFAULT_DIGEST_CAP};
use crate::domain::{Digest, Turn};
use crate::error::ModelError;
use crate::ports::ChatModel;

pub const DEFAULT_MAX_HISTORY_TURNS: usize = 50;

pub const SUGGESTED_QUESTIONS: [&str; 5] = [
    "What are the main topics discussed in this conversation?",
    "Summarize the key points from this conversation.",
    "Who are the most active participants?",
    "Are there any decisions or action items in this conversation?",
    "What's the overall sentiment of this conversation?",
];

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Characters of digest included in the seed message
    pub digest_cap: usize,
    /// Turns retained in history, seed included
    pub max_history_turns: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            digest_cap: DEFAULT_DIGEST_CAP,
            max_history_turns: DEFAULT_MAX_HISTORY_TURNS,
        }
    }
}

pub fn seed_prompt(digest_text: &str) -> String {
    format!(
        "Here's a Discord conversation summary to analyze. I'll be asking questions about it:\n\n\
         {digest_text}\n\n\
         Please keep your responses focused on the content of this conversation."
    )
}

pub struct AnalysisSession<M: ChatModel> {
    model: M,
    history: Vec<Turn>,
    options: SessionOptions,
}

impl<M: ChatModel> AnalysisSession<M> {
    /// Sends the seed message and returns the session. Seed failures are not retried.
    pub fn start(model: M, digest: &Digest, options: SessionOptions) -> Result<Self, ModelError> {
        let text = digest.text();
        let truncated = truncate_chars(&text, options.digest_cap);
        if truncated.len() < text.len() {
            tracing::info!(
                cap = options.digest_cap,
                dropped_bytes = text.len() - truncated.len(),
                "digest truncated before seeding"
            );
        }

        let prompt = seed_prompt(truncated);
        let reply = model.send(&[], &prompt)?;
        tracing::debug!(lines = digest.len(), "analysis session seeded");

        Ok(Self {
            model,
            history: vec![Turn {
                user: prompt,
                model: reply,
            }],
            options,
        })
    }

    /// Asks a follow-up question. A failure leaves the history untouched,
    /// so the same question can be asked again.
    pub fn ask(&mut self, question: &str) -> Result<String, ModelError> {
        let answer = self.model.send(&self.history, question)?;
        self.history.push(Turn {
            user: question.to_string(),
            model: answer.clone(),
        });
        self.prune();
        Ok(answer)
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// The reply the model gave to the seed message
    pub fn seed_reply(&self) -> &str {
        self.history.first().map_or("", |t| t.model.as_str())
    }

    // Drops the oldest follow-ups; the seed turn stays.
    fn prune(&mut self) {
        let max = self.options.max_history_turns.max(1);
        if self.history.len() > max {
            let excess = self.history.len() - max;
            self.history.drain(1..=excess);
            tracing::debug!(dropped = excess, "pruned analysis history");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;

    /// Replays scripted replies and records what it was sent
    #[derive(Default)]
    struct ScriptedModel {
        replies: RefCell<VecDeque<Result<String, ModelError>>>,
        calls: RefCell<Vec<(usize, String)>>,
    }

    impl ScriptedModel {
        fn with(replies: Vec<Result<String, ModelError>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                calls: RefCell::default(),
            }
        }
    }

    impl ChatModel for &ScriptedModel {
        fn send(&self, history: &[Turn], message: &str) -> Result<String, ModelError> {
            self.calls.borrow_mut().push((history.len(), message.to_string()));
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok("ok".to_string()))
        }
    }

    fn digest_of(text: &str) -> Digest {
        Digest::from_lines(vec![text.to_string()])
    }

    #[test]
    fn seed_embeds_digest_once() {
        let model = ScriptedModel::default();
        let session =
            AnalysisSession::start(&model, &digest_of("- bob (t): hi"), SessionOptions::default())
                .unwrap();

        let calls = model.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, 0);
        assert!(calls[0].1.contains("- bob (t): hi"));
        assert!(calls[0].1.contains("keep your responses focused"));
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn seed_truncates_digest_to_cap() {
        let model = ScriptedModel::default();
        let long = "~".repeat(60_000);
        AnalysisSession::start(&model, &digest_of(&long), SessionOptions::default()).unwrap();

        let calls = model.calls.borrow();
        let sent = calls[0].1.chars().filter(|c| *c == '~').count();
        assert_eq!(sent, 50_000);
    }

    #[test]
    fn seed_failure_propagates() {
        let model = ScriptedModel::with(vec![Err(ModelError::Unavailable("no key".into()))]);
        let result = AnalysisSession::start(&model, &digest_of("x"), SessionOptions::default());
        assert!(matches!(result, Err(ModelError::Unavailable(_))));
    }

    #[test]
    fn ask_sends_full_history_and_records_turn() {
        let model = ScriptedModel::with(vec![
            Ok("seeded".into()),
            Ok("topic A".into()),
            Ok("bob".into()),
        ]);
        let mut session =
            AnalysisSession::start(&model, &digest_of("x"), SessionOptions::default()).unwrap();

        assert_eq!(session.ask("topics?").unwrap(), "topic A");
        assert_eq!(session.ask("who?").unwrap(), "bob");

        let calls = model.calls.borrow();
        assert_eq!(calls[1], (1, "topics?".to_string()));
        assert_eq!(calls[2], (2, "who?".to_string()));
        assert_eq!(session.history().len(), 3);
        assert_eq!(session.seed_reply(), "seeded");
    }

    #[test]
    fn failed_ask_keeps_session_usable() {
        let model = ScriptedModel::with(vec![
            Ok("seeded".into()),
            Err(ModelError::Request("boom".into())),
            Ok("answer".into()),
        ]);
        let mut session =
            AnalysisSession::start(&model, &digest_of("x"), SessionOptions::default()).unwrap();

        assert!(session.ask("q").is_err());
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.ask("q").unwrap(), "answer");
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn history_is_pruned_but_keeps_seed() {
        let model = ScriptedModel::default();
        let options = SessionOptions {
            max_history_turns: 3,
            ..SessionOptions::default()
        };
        let mut session = AnalysisSession::start(&model, &digest_of("x"), options).unwrap();

        for q in ["q1", "q2", "q3", "q4"] {
            session.ask(q).unwrap();
        }

        let users: Vec<&str> = session.history().iter().map(|t| t.user.as_str()).collect();
        assert_eq!(users.len(), 3);
        assert!(users[0].starts_with("Here's a Discord conversation"));
        assert_eq!(&users[1..], ["q3", "q4"]);
    }
}
