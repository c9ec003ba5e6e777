//! Response directives returned to the chat transport

use std::time::Duration;

use crate::pricing::Coordinates;

/// One button: visible label and the id sent back when pressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub id: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            id: id.into(),
        }
    }
}

/// Buttons laid out in rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChoiceSet {
    pub rows: Vec<Vec<Choice>>,
}

impl ChoiceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lay `choices` out `columns` per row, then append `footer` as a last row
    pub fn grid(choices: Vec<Choice>, columns: usize, footer: Vec<Choice>) -> Self {
        let columns = columns.max(1);
        let mut rows: Vec<Vec<Choice>> = Vec::new();
        for choice in choices {
            match rows.last_mut() {
                Some(row) if row.len() < columns => row.push(choice),
                _ => rows.push(vec![choice]),
            }
        }
        if !footer.is_empty() {
            rows.push(footer);
        }
        Self { rows }
    }

    /// Append a row, ignoring empty ones
    pub fn row(mut self, row: Vec<Choice>) -> Self {
        if !row.is_empty() {
            self.rows.push(row);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every choice id, row by row
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(|choice| choice.id.as_str())
    }
}

/// What the transport should do after a turn
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Plain message with optional inline choices
    Reply { text: String, choices: ChoiceSet },
    /// Photo with caption; falls back to a reply when there is no image
    ProductCard {
        text: String,
        image_url: Option<String>,
        choices: ChoiceSet,
    },
    /// Ask the user to share a location (or type an address)
    RequestLocation { text: String },
    /// Send the order to a delivery agent
    NotifyAgent {
        agent_chat_id: i64,
        coordinates: Coordinates,
        text: String,
    },
    /// Message the user again after `delay`
    ScheduleFollowUp { delay: Duration, text: String },
    /// Answer the pending pre-checkout query
    AnswerPrecheck { ok: bool, error: Option<String> },
}

impl Directive {
    pub fn reply(text: impl Into<String>) -> Self {
        Directive::Reply {
            text: text.into(),
            choices: ChoiceSet::new(),
        }
    }

    pub fn reply_with(text: impl Into<String>, choices: ChoiceSet) -> Self {
        Directive::Reply {
            text: text.into(),
            choices,
        }
    }

    /// Text shown to the user, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            Directive::Reply { text, .. }
            | Directive::ProductCard { text, .. }
            | Directive::RequestLocation { text }
            | Directive::ScheduleFollowUp { text, .. } => Some(text),
            Directive::NotifyAgent { .. } | Directive::AnswerPrecheck { .. } => None,
        }
    }

    pub fn choices(&self) -> Option<&ChoiceSet> {
        match self {
            Directive::Reply { choices, .. } | Directive::ProductCard { choices, .. } => {
                Some(choices)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(n: usize) -> Choice {
        Choice::new(format!("item {n}"), format!("product:{n}"))
    }

    #[test]
    fn test_grid_layout() {
        let set = ChoiceSet::grid(
            (0..5).map(choice).collect(),
            3,
            vec![Choice::new("Cart", "cart")],
        );
        let widths: Vec<usize> = set.rows.iter().map(Vec::len).collect();
        assert_eq!(widths, vec![3, 2, 1]);
        assert_eq!(set.ids().last(), Some("cart"));
    }

    #[test]
    fn test_grid_zero_columns_is_one_per_row() {
        let set = ChoiceSet::grid((0..2).map(choice).collect(), 0, vec![]);
        assert_eq!(set.rows.len(), 2);
    }
}
