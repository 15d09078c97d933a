use crate::action::{Action, ActionKind, JetpackConnectionAction};
use crate::dispatcher::ActionsProcessor;

use super::{Store, StoreContext, unexpected_action};

/// Jetpack connection flow for self-hosted sites.
///
/// Only built for site (wporg) credentials.
#[derive(Clone)]
pub struct JetpackConnectionStore {
    ctx: StoreContext,
}

impl JetpackConnectionStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self { ctx }
    }

    async fn handle(&self, action: JetpackConnectionAction) {
        match action {
            JetpackConnectionAction::FetchConnectionUrl { completion } => {
                let result = self.ctx.remote.jetpack_connection_url().await;
                completion.complete(result.map(|body| body.url).map_err(Into::into));
            }
            JetpackConnectionAction::FetchConnectionStatus { completion } => {
                let result = self.ctx.remote.jetpack_connection_status().await;
                completion.complete(result.map_err(Into::into));
            }
        }
    }
}

impl ActionsProcessor for JetpackConnectionStore {
    fn on_action(&self, action: Action) {
        let Action::JetpackConnection(action) = action else {
            unexpected_action(ActionKind::JetpackConnection, &action);
            return;
        };
        let store = self.clone();
        self.ctx.spawn(async move { store.handle(action).await });
    }
}

impl Store for JetpackConnectionStore {
    fn action_kind(&self) -> ActionKind {
        ActionKind::JetpackConnection
    }
}
