//! Fast critical/priority scoring from message text.
//!
//! Two weighted scorers run before the model tier: "critical" mail
//! stays in the inbox, "priority" mail gets labeled but not archived.
//! Critical is checked first by explicit ordering; when both would
//! fire, critical wins regardless of score magnitude.

use crate::config::EngineConfig;
use crate::message::{Decision, Message, RuleAction, Tier, category};

/// Sender address fragments that signal operationally critical mail.
const CRITICAL_SENDERS: &[&str] = &[
    "security@",
    "alert@",
    "alerts@",
    "fraud@",
    "abuse@",
    "admin@",
    "postmaster@",
];

/// Critical keyword groups; hits within one group compound.
const CRITICAL_GROUPS: &[&[&str]] = &[
    // account security
    &[
        "fraud",
        "suspicious",
        "unauthorized",
        "breach",
        "compromised",
        "verify",
        "security alert",
    ],
    // urgency
    &[
        "urgent",
        "immediately",
        "action required",
        "final notice",
        "expires today",
    ],
    // account state
    &["password", "locked", "suspended", "deactivated"],
];

/// Priority keyword groups: time-sensitive but not critical.
const PRIORITY_GROUPS: &[&[&str]] = &[
    // scheduling
    &["meeting", "calendar", "invite", "reschedule", "call"],
    // deadlines and requests
    &[
        "deadline",
        "due",
        "tomorrow",
        "today",
        "eod",
        "response needed",
        "waiting on you",
        "approval",
        "review requested",
    ],
];

/// Domains whose presence says nothing about the sender being a colleague.
const FREE_MAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "aol.com",
    "icloud.com",
    "proton.me",
    "protonmail.com",
];

/// Phrases a human writing to another human tends to use.
const HUMAN_PHRASES: &[&str] = &[
    "let me know",
    "are you",
    "can you",
    "what do you think",
    "thanks",
    "thank you",
    "following up",
    "talk soon",
    "per our",
];

/// Phrases that betray generated or broadcast content.
const AUTOMATED_PHRASES: &[&str] = &[
    "unsubscribe",
    "view in browser",
    "view this email",
    "no-reply",
    "do not reply",
    "this is an automated",
    "manage preferences",
    "email preferences",
];

// Score weights. Group scores compound per hit and cap per group so a
// single keyword-stuffed subject cannot dominate alone.
const SENDER_PATTERN_WEIGHT: f32 = 0.35;
const SUBJECT_HIT_WEIGHT: f32 = 0.25;
const BODY_HIT_WEIGHT: f32 = 0.1;
const GROUP_CAP: f32 = 0.5;
const PERSONAL_WEIGHT_CRITICAL: f32 = 0.15;
const PERSONAL_WEIGHT_PRIORITY: f32 = 0.35;

/// Scores "critical" / "priority" / personal-human signals.
#[derive(Debug, Clone)]
pub struct HeuristicClassifier {
    critical_threshold: f32,
    priority_threshold: f32,
}

impl HeuristicClassifier {
    /// Creates a classifier with thresholds from configuration.
    #[must_use]
    pub const fn new(config: &EngineConfig) -> Self {
        Self {
            critical_threshold: config.critical_threshold,
            priority_threshold: config.priority_threshold,
        }
    }

    /// Returns a heuristic decision, or `None` when neither scorer fires.
    #[must_use]
    pub fn classify(&self, message: &Message) -> Option<Decision> {
        // Critical first; when both fire, critical wins by ordering.
        let critical = self.critical_score(message);
        if critical >= self.critical_threshold {
            return Some(Decision::new(
                category::INBOX,
                RuleAction::LabelOnly,
                format!("critical score {critical:.2}"),
                critical,
                Tier::Heuristic,
            ));
        }
        let priority = self.priority_score(message);
        if priority >= self.priority_threshold {
            return Some(Decision::new(
                category::PRIORITY,
                RuleAction::LabelOnly,
                format!("priority score {priority:.2}"),
                priority,
                Tier::Heuristic,
            ));
        }
        None
    }

    /// Critical score in `[0, 1]`.
    #[must_use]
    pub fn critical_score(&self, message: &Message) -> f32 {
        let sender = message.sender_address();
        let subject = message.subject.to_lowercase();
        let body = message.body.to_lowercase();

        let mut score = 0.0;
        if CRITICAL_SENDERS.iter().any(|p| sender.contains(p)) {
            score += SENDER_PATTERN_WEIGHT;
        }
        for group in CRITICAL_GROUPS {
            score += group_score(group, &subject, &body);
        }
        score += PERSONAL_WEIGHT_CRITICAL * personal_score(message);
        score.clamp(0.0, 1.0)
    }

    /// Priority score in `[0, 1]`.
    #[must_use]
    pub fn priority_score(&self, message: &Message) -> f32 {
        let subject = message.subject.to_lowercase();
        let body = message.body.to_lowercase();

        let mut score = 0.0;
        for group in PRIORITY_GROUPS {
            score += group_score(group, &subject, &body);
        }
        score += PERSONAL_WEIGHT_PRIORITY * personal_score(message);
        score.clamp(0.0, 1.0)
    }
}

/// Compounding score for one keyword group, subject above body.
fn group_score(group: &[&str], subject: &str, body: &str) -> f32 {
    let mut score = 0.0;
    for keyword in group {
        if subject.contains(keyword) {
            score += SUBJECT_HIT_WEIGHT;
        } else if body.contains(keyword) {
            score += BODY_HIT_WEIGHT;
        }
    }
    score.min(GROUP_CAP)
}

/// Personal-sender sub-score in `[0, 1]`.
///
/// A corporate (non-free-mail) domain, a `first.last` address shape,
/// and human phrasing raise it; automated-content phrases lower it.
fn personal_score(message: &Message) -> f32 {
    let sender = message.sender_address();
    let body = message.body.to_lowercase();

    let mut score = 0.0;
    if let Some(domain) = message.sender_domain()
        && !FREE_MAIL_DOMAINS.contains(&domain.as_str())
    {
        score += 0.3;
    }
    if has_first_last_shape(&sender) {
        score += 0.4;
    }

    let human_hits = HUMAN_PHRASES.iter().filter(|p| body.contains(*p)).count();
    let automated_hits = AUTOMATED_PHRASES
        .iter()
        .filter(|p| body.contains(*p))
        .count();
    score += (human_hits as f32 * 0.15).min(0.45);
    score -= automated_hits as f32 * 0.2;

    score.clamp(0.0, 1.0)
}

/// Whether the local part looks like `first.last`.
fn has_first_last_shape(address: &str) -> bool {
    let Some((local, _)) = address.split_once('@') else {
        return false;
    };
    let segments: Vec<&str> = local.split('.').collect();
    segments.len() == 2
        && segments
            .iter()
            .all(|s| !s.is_empty() && s.chars().all(char::is_alphabetic))
}
