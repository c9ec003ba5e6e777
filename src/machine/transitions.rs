//! Transition table of the ordering flow
//!
//! Rows are keyed by (state or wildcard, event kind, optional guard). Lookup
//! takes the first matching row for the exact state in table order, then the
//! wildcard rows. `TransitionTable::new` rejects tables where that lookup
//! would be ambiguous or where a row could never fire.

use std::collections::HashSet;

use super::state::{Event, EventKind, OrderState};
use crate::errors::{OrderError, OrderResult};
use crate::session::validate_email;

/// Extra condition on the event payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Guard {
    /// Text that passes e-mail validation
    EmailShaped,
}

impl Guard {
    pub fn accepts(self, event: &Event) -> bool {
        match (self, event) {
            (Guard::EmailShaped, Event::Text(text)) => validate_email(text).is_ok(),
            (Guard::EmailShaped, _) => false,
        }
    }
}

/// Side effect run when a transition fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ShowMenu,
    ShowPage,
    Paginate,
    ShowProduct,
    AddToCart,
    ShowCart,
    Checkout,
    StoreEmail,
    RepromptEmail,
    LocateCustomer,
    IssueInvoice,
    Precheck,
    CompleteOrder,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// `None` matches every state
    pub from: Option<OrderState>,
    pub on: EventKind,
    pub guard: Option<Guard>,
    pub action: Action,
}

const fn any(on: EventKind, action: Action) -> Transition {
    Transition {
        from: None,
        on,
        guard: None,
        action,
    }
}

const fn on(from: OrderState, on: EventKind, action: Action) -> Transition {
    Transition {
        from: Some(from),
        on,
        guard: None,
        action,
    }
}

const fn guarded(from: OrderState, on: EventKind, guard: Guard, action: Action) -> Transition {
    Transition {
        from: Some(from),
        on,
        guard: Some(guard),
        action,
    }
}

use Action as A;
use EventKind as E;
use OrderState as S;

/// The ordering flow
pub const ORDER_FLOW: &[Transition] = &[
    any(E::Start, A::ShowMenu),
    any(E::Cancel, A::Cancel),
    on(S::Menu, E::BackToMenu, A::ShowMenu),
    on(S::Menu, E::ViewCart, A::ShowCart),
    on(S::ProductList, E::NextPage, A::Paginate),
    on(S::ProductList, E::PrevPage, A::Paginate),
    on(S::ProductList, E::SelectProduct, A::ShowProduct),
    on(S::ProductList, E::ViewCart, A::ShowCart),
    on(S::ProductDetail, E::AddToCart, A::AddToCart),
    on(S::ProductDetail, E::BackToMenu, A::ShowPage),
    on(S::ProductDetail, E::ViewCart, A::ShowCart),
    on(S::Cart, E::RemoveLine, A::ShowCart),
    on(S::Cart, E::ViewCart, A::ShowCart),
    on(S::Cart, E::BackToMenu, A::ShowPage),
    on(S::Cart, E::Checkout, A::Checkout),
    guarded(S::AwaitingEmail, E::Text, Guard::EmailShaped, A::StoreEmail),
    on(S::AwaitingEmail, E::Text, A::RepromptEmail),
    on(S::AwaitingEmail, E::Back, A::ShowCart),
    on(S::AwaitingLocation, E::Location, A::LocateCustomer),
    on(S::AwaitingLocation, E::Text, A::LocateCustomer),
    on(S::DeliveryOffer, E::ChooseMode, A::IssueInvoice),
    on(S::DeliveryOffer, E::Back, A::ShowCart),
    on(S::AwaitingPaymentPrecheck, E::PreCheckout, A::Precheck),
    on(S::PaymentSucceeded, E::PaymentConfirmed, A::CompleteOrder),
    on(S::Terminal, E::BackToMenu, A::ShowMenu),
];

/// Validated transition table
#[derive(Debug, Clone)]
pub struct TransitionTable {
    rows: Vec<Transition>,
}

impl TransitionTable {
    pub fn new(rows: &[Transition]) -> OrderResult<Self> {
        let mut keys = HashSet::new();
        let mut wildcards = HashSet::new();
        let mut specific = HashSet::new();
        let mut unguarded = HashSet::new();

        for row in rows {
            if !keys.insert((row.from, row.on, row.guard)) {
                return Err(invalid(format!("duplicate row {row:?}")));
            }

            match row.from {
                None => {
                    wildcards.insert(row.on);
                }
                Some(state) => {
                    specific.insert(row.on);
                    if row.guard.is_some() && unguarded.contains(&(state, row.on)) {
                        return Err(invalid(format!(
                            "guarded row {row:?} is shadowed by an earlier unguarded row"
                        )));
                    }
                    if row.guard.is_none() {
                        unguarded.insert((state, row.on));
                    }
                }
            }

            if row.from.is_none() && row.guard.is_some() {
                return Err(invalid(format!("wildcard row {row:?} cannot be guarded")));
            }
        }

        if let Some(kind) = wildcards.intersection(&specific).next() {
            return Err(invalid(format!(
                "event {kind:?} has both wildcard and state rows"
            )));
        }

        Ok(Self {
            rows: rows.to_vec(),
        })
    }

    /// Table of the ordering flow
    pub fn order_flow() -> OrderResult<Self> {
        Self::new(ORDER_FLOW)
    }

    /// Action for `event` in `state`, `None` when nothing matches
    pub fn resolve(&self, state: OrderState, event: &Event) -> Option<Action> {
        let kind = event.kind();
        let matches = |row: &&Transition| {
            row.on == kind && row.guard.map_or(true, |guard| guard.accepts(event))
        };

        self.rows
            .iter()
            .filter(|row| row.from == Some(state))
            .find(matches)
            .or_else(|| self.rows.iter().filter(|row| row.from.is_none()).find(matches))
            .map(|row| row.action)
    }
}

fn invalid(reason: String) -> OrderError {
    OrderError::InvalidTransitionTable(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::DeliveryMode;

    fn table() -> TransitionTable {
        TransitionTable::order_flow().unwrap()
    }

    #[test]
    fn test_order_flow_is_valid() {
        assert!(TransitionTable::order_flow().is_ok());
    }

    #[test]
    fn test_email_guard_routes_text() {
        let table = table();
        assert_eq!(
            table.resolve(S::AwaitingEmail, &Event::Text("a@b.com".into())),
            Some(A::StoreEmail)
        );
        assert_eq!(
            table.resolve(S::AwaitingEmail, &Event::Text("not-an-email".into())),
            Some(A::RepromptEmail)
        );
    }

    #[test]
    fn test_wildcards_apply_everywhere() {
        let table = table();
        for state in [S::Menu, S::Cart, S::DeliveryOffer, S::PaymentSucceeded] {
            assert_eq!(table.resolve(state, &Event::Cancel), Some(A::Cancel));
            assert_eq!(table.resolve(state, &Event::Start), Some(A::ShowMenu));
        }
    }

    #[test]
    fn test_unmatched_event_resolves_to_none() {
        let table = table();
        assert_eq!(table.resolve(S::Cart, &Event::NextPage), None);
        assert_eq!(
            table.resolve(S::Menu, &Event::ChooseMode(DeliveryMode::Pickup)),
            None
        );
    }

    #[test]
    fn test_duplicate_rows_rejected() {
        let rows = [
            on(S::Cart, E::Checkout, A::Checkout),
            on(S::Cart, E::Checkout, A::ShowCart),
        ];
        assert!(matches!(
            TransitionTable::new(&rows),
            Err(OrderError::InvalidTransitionTable(_))
        ));
    }

    #[test]
    fn test_wildcard_overlap_rejected() {
        let rows = [
            any(E::Cancel, A::Cancel),
            on(S::Cart, E::Cancel, A::ShowCart),
        ];
        assert!(TransitionTable::new(&rows).is_err());
    }

    #[test]
    fn test_shadowed_guard_rejected() {
        let rows = [
            on(S::AwaitingEmail, E::Text, A::RepromptEmail),
            guarded(S::AwaitingEmail, E::Text, Guard::EmailShaped, A::StoreEmail),
        ];
        assert!(TransitionTable::new(&rows).is_err());
    }
}
