use crate::action::{Action, ActionKind, SupportAction};
use crate::dispatcher::ActionsProcessor;
use crate::error::{ApiError, StoreError};
use crate::model::SupportTicket;

use super::{Store, StoreContext, unexpected_action};

/// Files support tickets. Nothing is stored locally; failures are
/// normalized to [`ApiError`].
#[derive(Clone)]
pub struct SupportStore {
    ctx: StoreContext,
}

impl SupportStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self { ctx }
    }

    async fn handle(&self, action: SupportAction) {
        match action {
            SupportAction::CreateTicket { ticket, completion } => {
                completion.complete(self.create_ticket(&ticket).await);
            }
        }
    }

    async fn create_ticket(&self, ticket: &SupportTicket) -> Result<(), StoreError> {
        self.ctx
            .remote
            .create_ticket(ticket)
            .await
            .map_err(|err| StoreError::from(ApiError::from_network(&err)))
    }
}

impl ActionsProcessor for SupportStore {
    fn on_action(&self, action: Action) {
        let Action::Support(action) = action else {
            unexpected_action(ActionKind::Support, &action);
            return;
        };
        let store = self.clone();
        self.ctx.spawn(async move { store.handle(action).await });
    }
}

impl Store for SupportStore {
    fn action_kind(&self) -> ActionKind {
        ActionKind::Support
    }
}
