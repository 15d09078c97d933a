use std::sync::Arc;

use crate::action::{Action, ActionKind, EventAction};
use crate::dispatcher::ActionsProcessor;
use crate::error::StoreError;
use crate::model::{NewEvent, RemoteEvent};
use crate::records::{StoredEvent, StoredUserEvent};
use crate::storage::Record;

use super::{Store, StoreContext, WriterSlot, unexpected_action, upsert_all};

/// Synchronizes events and user participations into local storage.
#[derive(Clone)]
pub struct EventStore {
    ctx: StoreContext,
    writer: Arc<WriterSlot>,
}

impl EventStore {
    pub fn new(ctx: StoreContext) -> Self {
        let writer = Arc::new(WriterSlot::new(&ctx));
        Self { ctx, writer }
    }

    async fn handle(&self, action: EventAction) {
        match action {
            EventAction::SynchronizeEvents {
                page,
                page_size,
                replace_existing,
                completion,
            } => {
                completion.complete(
                    self.synchronize_events(page, page_size, replace_existing)
                        .await,
                );
            }
            EventAction::SynchronizeUserEvents {
                user_id,
                page,
                page_size,
                replace_existing,
                completion,
            } => {
                completion.complete(
                    self.synchronize_user_events(user_id, page, page_size, replace_existing)
                        .await,
                );
            }
            EventAction::RetrieveEvent {
                event_id,
                completion,
            } => {
                completion.complete(self.retrieve_event(event_id).await);
            }
            EventAction::CreateEvent { draft, completion } => {
                completion.complete(self.create_event(draft).await);
            }
            EventAction::DeleteEvent {
                event_id,
                completion,
            } => {
                completion.complete(self.delete_event(event_id).await);
            }
        }
    }

    async fn synchronize_events(
        &self,
        page: u32,
        page_size: u32,
        replace_existing: bool,
    ) -> Result<bool, StoreError> {
        let response = self.ctx.remote.load_events(page, page_size).await?;
        let has_next = response.has_next_page();
        let events = response.events;
        let staged = self
            .writer
            .commit(move |ctx| upsert_all::<StoredEvent, _>(ctx, &events, replace_existing))
            .await?;
        tracing::debug!(page, staged, replace_existing, "events synchronized");
        Ok(has_next)
    }

    async fn synchronize_user_events(
        &self,
        user_id: i64,
        page: u32,
        page_size: u32,
        replace_existing: bool,
    ) -> Result<bool, StoreError> {
        let response = self
            .ctx
            .remote
            .load_user_events(user_id, page, page_size)
            .await?;
        let has_next = response.next_page.is_some();
        let user_events = response.user_events;
        self.writer
            .commit(move |ctx| {
                // Only this user's rows are replaced.
                if replace_existing {
                    for stale in ctx.all::<StoredUserEvent>()? {
                        if stale.user_id == user_id {
                            ctx.delete::<StoredUserEvent>(&stale.record_id());
                        }
                    }
                }
                upsert_all::<StoredUserEvent, _>(ctx, &user_events, false)
            })
            .await?;
        Ok(has_next)
    }

    async fn retrieve_event(&self, event_id: i64) -> Result<RemoteEvent, StoreError> {
        let event = self.ctx.remote.load_event(event_id).await?;
        self.store_one(event).await
    }

    async fn create_event(&self, draft: NewEvent) -> Result<RemoteEvent, StoreError> {
        let event = self.ctx.remote.create_event(&draft).await?;
        self.store_one(event).await
    }

    async fn store_one(&self, event: RemoteEvent) -> Result<RemoteEvent, StoreError> {
        let batch = vec![event];
        self.writer
            .commit(move |ctx| {
                upsert_all::<StoredEvent, _>(ctx, &batch, false)?;
                Ok(batch)
            })
            .await
            .map(|mut batch| batch.remove(0))
    }

    async fn delete_event(&self, event_id: i64) -> Result<(), StoreError> {
        self.ctx.remote.delete_event(event_id).await?;
        self.writer
            .commit(move |ctx| {
                ctx.delete::<StoredEvent>(&event_id.to_string());
                Ok(())
            })
            .await
    }
}

impl ActionsProcessor for EventStore {
    fn on_action(&self, action: Action) {
        let Action::Event(action) = action else {
            unexpected_action(ActionKind::Event, &action);
            return;
        };
        let store = self.clone();
        self.ctx.spawn(async move { store.handle(action).await });
    }
}

impl Store for EventStore {
    fn action_kind(&self) -> ActionKind {
        ActionKind::Event
    }
}
