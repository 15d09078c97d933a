use std::sync::Arc;

use crate::action::{Action, ActionKind, EventCategoryAction};
use crate::dispatcher::ActionsProcessor;
use crate::error::StoreError;
use crate::model::RemoteCategory;
use crate::records::StoredEventCategory;

use super::{Store, StoreContext, WriterSlot, unexpected_action, upsert_all};

/// Synchronizes event categories. The first page replaces everything
/// stored, later pages append.
#[derive(Clone)]
pub struct EventCategoryStore {
    ctx: StoreContext,
    writer: Arc<WriterSlot>,
}

impl EventCategoryStore {
    pub fn new(ctx: StoreContext) -> Self {
        let writer = Arc::new(WriterSlot::new(&ctx));
        Self { ctx, writer }
    }

    async fn handle(&self, action: EventCategoryAction) {
        match action {
            EventCategoryAction::SynchronizeEventCategories {
                page,
                page_size,
                completion,
            } => {
                completion.complete(self.synchronize(page, page_size).await);
            }
            EventCategoryAction::RetrieveEventCategory {
                category_id,
                completion,
            } => {
                completion.complete(self.retrieve(category_id).await);
            }
        }
    }

    async fn synchronize(&self, page: u32, page_size: u32) -> Result<bool, StoreError> {
        let response = self.ctx.remote.load_categories(page, page_size).await?;
        let has_next = response.next_page.is_some();
        let categories = response.categories;
        let replace_existing = page <= 1;
        self.writer
            .commit(move |ctx| {
                upsert_all::<StoredEventCategory, _>(ctx, &categories, replace_existing)
            })
            .await?;
        Ok(has_next)
    }

    async fn retrieve(&self, category_id: i64) -> Result<RemoteCategory, StoreError> {
        let category = self.ctx.remote.load_category(category_id).await?;
        let batch = [category.clone()];
        self.writer
            .commit(move |ctx| upsert_all::<StoredEventCategory, _>(ctx, &batch, false))
            .await?;
        Ok(category)
    }
}

impl ActionsProcessor for EventCategoryStore {
    fn on_action(&self, action: Action) {
        let Action::EventCategory(action) = action else {
            unexpected_action(ActionKind::EventCategory, &action);
            return;
        };
        let store = self.clone();
        self.ctx.spawn(async move { store.handle(action).await });
    }
}

impl Store for EventCategoryStore {
    fn action_kind(&self) -> ActionKind {
        ActionKind::EventCategory
    }
}
