use crate::action::{Action, ActionKind, NotificationAction};
use crate::dispatcher::ActionsProcessor;

use super::{Store, StoreContext, unexpected_action};

/// Registers and unregisters this device for push notifications.
#[derive(Clone)]
pub struct NotificationStore {
    ctx: StoreContext,
}

impl NotificationStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self { ctx }
    }

    async fn handle(&self, action: NotificationAction) {
        match action {
            NotificationAction::RegisterDevice { device, completion } => {
                let result = self.ctx.remote.register_device(&device).await;
                if let Ok(registration) = &result {
                    tracing::info!(device_id = %registration.device_id, "device registered");
                }
                completion.complete(result.map_err(Into::into));
            }
            NotificationAction::UnregisterDevice {
                device_id,
                completion,
            } => {
                let result = self.ctx.remote.unregister_device(&device_id).await;
                completion.complete(result.map_err(Into::into));
            }
        }
    }
}

impl ActionsProcessor for NotificationStore {
    fn on_action(&self, action: Action) {
        let Action::Notification(action) = action else {
            unexpected_action(ActionKind::Notification, &action);
            return;
        };
        let store = self.clone();
        self.ctx.spawn(async move { store.handle(action).await });
    }
}

impl Store for NotificationStore {
    fn action_kind(&self) -> ActionKind {
        ActionKind::Notification
    }
}
