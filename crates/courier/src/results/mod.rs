//! Result items emitted by a search
//!
//! Every item is plain data. Actions are described by [`Operation`] values
//! naming a registered operation plus its arguments; the
//! [`ActionHandler`](crate::actions::ActionHandler) executes them later.

mod builders;
mod labels;

pub use builders::{
    build_email_result, build_event_result, build_quick_action_results, build_sign_in_result,
    build_sign_out_result, email_operations, event_operations, matches_sign_out,
};
pub use labels::{event_status, relative_recency};

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{CalendarEvent, Email, ItemId};

/// Result category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Action,
    Email,
    Event,
}

/// What a result item represents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResultKind {
    /// A configured quick action
    Action { action_id: String },
    SignIn,
    SignOut,
    Email(Email),
    Event(CalendarEvent),
}

impl ResultKind {
    pub fn category(&self) -> Category {
        match self {
            ResultKind::Action { .. } | ResultKind::SignIn | ResultKind::SignOut => Category::Action,
            ResultKind::Email(_) => Category::Email,
            ResultKind::Event(_) => Category::Event,
        }
    }
}

/// An invocable operation attached to a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Show the item in the desktop client
    OpenItem { id: ItemId },
    Reply { id: ItemId },
    ReplyAll { id: ItemId },
    Forward { id: ItemId },
    /// Open a link in the browser
    OpenLink { url: String },
    JoinMeeting { url: String },
    RunQuickAction { action_id: String, uri: String },
    SignIn,
    SignOut,
}

impl Operation {
    /// Registered operation name
    pub fn name(&self) -> &'static str {
        match self {
            Operation::OpenItem { .. } => "open",
            Operation::Reply { .. } => "reply",
            Operation::ReplyAll { .. } => "reply-all",
            Operation::Forward { .. } => "forward",
            Operation::OpenLink { .. } => "open-link",
            Operation::JoinMeeting { .. } => "join-meeting",
            Operation::RunQuickAction { .. } => "quick-action",
            Operation::SignIn => "sign-in",
            Operation::SignOut => "sign-out",
        }
    }

    /// Whether running this requires the local backend
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Operation::OpenItem { .. }
                | Operation::Reply { .. }
                | Operation::ReplyAll { .. }
                | Operation::Forward { .. }
        )
    }
}

/// One entry in the search output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    pub display_name: String,
    pub subtitle: String,
    pub category: Category,
    /// Relevance; ordering across categories is emission order
    pub score: f64,
    pub tags: BTreeSet<String>,
    /// First entry is the default operation
    pub operations: Vec<Operation>,
    pub kind: ResultKind,
}

impl ResultItem {
    pub fn default_operation(&self) -> Option<&Operation> {
        self.operations.first()
    }

    pub fn is_email(&self) -> bool {
        matches!(self.kind, ResultKind::Email(_))
    }

    pub fn is_event(&self) -> bool {
        matches!(self.kind, ResultKind::Event(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_names_are_unique() {
        let ops = [
            Operation::OpenItem { id: ItemId::new("a") },
            Operation::Reply { id: ItemId::new("a") },
            Operation::ReplyAll { id: ItemId::new("a") },
            Operation::Forward { id: ItemId::new("a") },
            Operation::OpenLink { url: String::new() },
            Operation::JoinMeeting { url: String::new() },
            Operation::RunQuickAction { action_id: String::new(), uri: String::new() },
            Operation::SignIn,
            Operation::SignOut,
        ];
        let names: BTreeSet<_> = ops.iter().map(Operation::name).collect();
        assert_eq!(names.len(), ops.len());
        assert_eq!(ops.iter().filter(|o| o.is_mutating()).count(), 4);
    }

    #[test]
    fn test_kind_category() {
        assert_eq!(ResultKind::SignIn.category(), Category::Action);
        assert_eq!(ResultKind::Action { action_id: "x".into() }.category(), Category::Action);
    }
}
