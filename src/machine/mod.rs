//! Conversation state machine
//!
//! `OrderMachine::handle` is the single entry point: it loads the user's
//! session, resolves the transition for the event, runs the action on a
//! working copy of the session and commits that copy only when the action
//! succeeds. A failed action leaves the stored session untouched and the
//! user gets a localized error message instead.

mod actions;
pub mod response;
pub mod state;
pub mod transitions;
pub mod views;

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::FlowConfig;
use crate::errors::{OrderError, OrderResult};
use crate::gateway::{CommerceGateway, FulfillmentDirectory, Geocoder, PaymentGateway, UserKey};
use crate::localization::t_lang;
use crate::session::{Session, SessionStore};

pub use response::{Choice, ChoiceSet, Directive};
pub use state::{Event, EventKind, OrderState};
pub use transitions::{Action, TransitionTable};

/// Collaborators and parameters shared by every turn
#[derive(Clone)]
pub struct OrderContext {
    pub commerce: Arc<dyn CommerceGateway>,
    pub directory: Arc<dyn FulfillmentDirectory>,
    pub geocoder: Arc<dyn Geocoder>,
    pub payments: Arc<dyn PaymentGateway>,
    pub sessions: Arc<SessionStore>,
    pub config: FlowConfig,
}

/// Outcome of one handled event
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub state: OrderState,
    pub directives: Vec<Directive>,
    /// A transition ran and its action succeeded; `false` when the state was held
    pub completed: bool,
}

/// Result of a successful action
#[derive(Debug)]
pub(crate) struct Step {
    next: OrderState,
    directives: Vec<Directive>,
}

impl Step {
    fn to(next: OrderState, directives: Vec<Directive>) -> Self {
        Self { next, directives }
    }
}

pub struct OrderMachine {
    ctx: OrderContext,
    table: TransitionTable,
}

impl OrderMachine {
    pub fn new(ctx: OrderContext) -> OrderResult<Self> {
        Ok(Self {
            ctx,
            table: TransitionTable::order_flow()?,
        })
    }

    pub fn context(&self) -> &OrderContext {
        &self.ctx
    }

    /// Current state of a user, `None` when they have no session
    pub fn state_of(&self, user: UserKey) -> Option<OrderState> {
        self.ctx.sessions.load(user).map(|session| session.state)
    }

    /// Process one event for `user` and return what to show them
    pub async fn handle(&self, user: UserKey, event: Event, language: Option<&str>) -> Turn {
        let stored = self.ctx.sessions.load(user);
        let fresh = stored.is_none();
        let mut session = stored.unwrap_or_else(|| Session::new(None));
        if let Some(language) = language {
            session.language_code = Some(language.to_string());
        }
        let state = session.state;

        let action = match self.table.resolve(state, &event) {
            Some(action) => action,
            None if matches!(event, Event::PreCheckout { .. }) => {
                warn!(user_id = %user, state = ?state, "Pre-checkout without a pending invoice");
                return Turn {
                    state,
                    directives: vec![failure(&OrderError::PaymentMismatch, &event, session.language())],
                    completed: false,
                };
            }
            None if fresh => {
                debug!(user_id = %user, "No session, showing the menu");
                Action::ShowMenu
            }
            None => {
                debug!(user_id = %user, state = ?state, event = ?event.kind(), "Unhandled event");
                return Turn {
                    state,
                    directives: vec![views::hint(session.language())],
                    completed: false,
                };
            }
        };

        debug!(user_id = %user, state = ?state, action = ?action, "Running transition");

        let mut working = session.clone();
        match self.run(action, user, &mut working, &event).await {
            Ok(step) => {
                info!(user_id = %user, from = ?state, to = ?step.next, "Transition completed");
                if step.next == OrderState::Terminal {
                    self.ctx.sessions.discard(user);
                } else {
                    working.state = step.next;
                    self.ctx.sessions.save(user, working);
                }
                Turn {
                    state: step.next,
                    directives: step.directives,
                    completed: true,
                }
            }
            Err(err) => {
                warn!(user_id = %user, state = ?state, action = ?action, error = %err, "Transition failed");
                Turn {
                    state,
                    directives: vec![failure(&err, &event, session.language())],
                    completed: false,
                }
            }
        }
    }

    async fn run(
        &self,
        action: Action,
        user: UserKey,
        session: &mut Session,
        event: &Event,
    ) -> OrderResult<Step> {
        match action {
            Action::ShowMenu => self.show_menu(user, session).await,
            Action::ShowPage => self.show_page(user, session).await,
            Action::Paginate => self.paginate(user, session, event).await,
            Action::ShowProduct => self.show_product(session, event).await,
            Action::AddToCart => self.add_to_cart(user, session).await,
            Action::ShowCart => self.show_cart(user, session, event).await,
            Action::Checkout => self.checkout(user, session).await,
            Action::StoreEmail => self.store_email(user, session, event).await,
            Action::RepromptEmail => Ok(self.reprompt_email(session, event)),
            Action::LocateCustomer => self.locate_customer(session, event).await,
            Action::IssueInvoice => self.issue_invoice(user, session, event).await,
            Action::Precheck => self.precheck(session, event),
            Action::CompleteOrder => self.complete_order(user, session, event).await,
            Action::Cancel => Ok(Step::to(
                OrderState::Terminal,
                vec![views::farewell(session.language())],
            )),
        }
    }
}

/// Directive reporting a failed turn
fn failure(err: &OrderError, event: &Event, language: Option<&str>) -> Directive {
    let text = t_lang(err.message_key(), language);
    match event {
        Event::PreCheckout { .. } => Directive::AnswerPrecheck {
            ok: false,
            error: Some(text),
        },
        _ => Directive::reply(text),
    }
}
