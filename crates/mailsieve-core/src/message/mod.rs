//! Message and decision data models.

mod model;

pub use model::{Decision, Label, LabelId, Message, MessageId, RuleAction, Tier, category};
