use std::sync::Arc;

use crate::action::{AccountAction, Action, ActionKind};
use crate::dispatcher::ActionsProcessor;
use crate::error::StoreError;
use crate::model::RemoteAccount;
use crate::records::StoredAccount;

use super::{Store, StoreContext, WriterSlot, unexpected_action, upsert_all};

/// Keeps the signed-in WordPress.com account in local storage.
///
/// Only built for WordPress.com credentials.
#[derive(Clone)]
pub struct AccountStore {
    ctx: StoreContext,
    writer: Arc<WriterSlot>,
}

impl AccountStore {
    pub fn new(ctx: StoreContext) -> Self {
        let writer = Arc::new(WriterSlot::new(&ctx));
        Self { ctx, writer }
    }

    async fn handle(&self, action: AccountAction) {
        match action {
            AccountAction::SynchronizeAccount { completion } => {
                completion.complete(self.synchronize().await);
            }
            AccountAction::LoadAccount {
                user_id,
                completion,
            } => {
                let result = self
                    .ctx
                    .storage
                    .view_storage()
                    .load::<StoredAccount>(&user_id.to_string());
                completion.complete(result.map_err(Into::into));
            }
        }
    }

    async fn synchronize(&self) -> Result<RemoteAccount, StoreError> {
        let account = self.ctx.remote.load_account().await?;
        let batch = [account.clone()];
        self.writer
            .commit(move |ctx| upsert_all::<StoredAccount, _>(ctx, &batch, false))
            .await?;
        tracing::debug!(user_id = account.user_id, "account synchronized");
        Ok(account)
    }
}

impl ActionsProcessor for AccountStore {
    fn on_action(&self, action: Action) {
        let Action::Account(action) = action else {
            unexpected_action(ActionKind::Account, &action);
            return;
        };
        let store = self.clone();
        self.ctx.spawn(async move { store.handle(action).await });
    }
}

impl Store for AccountStore {
    fn action_kind(&self) -> ActionKind {
        ActionKind::Account
    }
}
