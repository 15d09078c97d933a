use crate::action::{AccountCreationAction, Action, ActionKind};
use crate::dispatcher::ActionsProcessor;

use super::{Store, StoreContext, unexpected_action};

/// Signs up new WordPress.com accounts. Available before login.
#[derive(Clone)]
pub struct AccountCreationStore {
    ctx: StoreContext,
}

impl AccountCreationStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self { ctx }
    }

    async fn handle(&self, action: AccountCreationAction) {
        match action {
            AccountCreationAction::CreateAccount {
                email,
                username,
                password,
                completion,
            } => {
                let result = self
                    .ctx
                    .remote
                    .create_account(&email, &username, &password)
                    .await;
                completion.complete(result.map_err(Into::into));
            }
        }
    }
}

impl ActionsProcessor for AccountCreationStore {
    fn on_action(&self, action: Action) {
        let Action::AccountCreation(action) = action else {
            unexpected_action(ActionKind::AccountCreation, &action);
            return;
        };
        let store = self.clone();
        self.ctx.spawn(async move { store.handle(action).await });
    }
}

impl Store for AccountCreationStore {
    fn action_kind(&self) -> ActionKind {
        ActionKind::AccountCreation
    }
}
