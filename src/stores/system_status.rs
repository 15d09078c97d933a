use crate::action::{Action, ActionKind, SystemStatusAction};
use crate::dispatcher::ActionsProcessor;

use super::{Store, StoreContext, unexpected_action};

/// Reads the server's system status report. Read only.
#[derive(Clone)]
pub struct SystemStatusStore {
    ctx: StoreContext,
}

impl SystemStatusStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self { ctx }
    }

    async fn handle(&self, action: SystemStatusAction) {
        match action {
            SystemStatusAction::FetchSystemStatus { completion } => {
                let result = self.ctx.remote.load_system_status().await;
                completion.complete(result.map_err(Into::into));
            }
        }
    }
}

impl ActionsProcessor for SystemStatusStore {
    fn on_action(&self, action: Action) {
        let Action::SystemStatus(action) = action else {
            unexpected_action(ActionKind::SystemStatus, &action);
            return;
        };
        let store = self.clone();
        self.ctx.spawn(async move { store.handle(action).await });
    }
}

impl Store for SystemStatusStore {
    fn action_kind(&self) -> ActionKind {
        ActionKind::SystemStatus
    }
}
