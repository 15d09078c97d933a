use std::sync::Arc;

use crate::action::{Action, ActionKind, GooglePlaceAction};
use crate::dispatcher::ActionsProcessor;
use crate::error::{ApiError, NetworkError, StoreError};
use crate::model::GooglePlace;
use crate::records::StoredGooglePlace;

use super::{Store, StoreContext, WriterSlot, unexpected_action, upsert_all};

/// Looks places up through the Google Places proxy and caches them.
///
/// Every failure reaches the caller as an [`ApiError`]: transport errors
/// are classified with [`ApiError::from_network`], and errors Google
/// reports in the response `status` field are mapped onto the same set.
#[derive(Clone)]
pub struct GooglePlaceStore {
    ctx: StoreContext,
    writer: Arc<WriterSlot>,
}

impl GooglePlaceStore {
    pub fn new(ctx: StoreContext) -> Self {
        let writer = Arc::new(WriterSlot::new(&ctx));
        Self { ctx, writer }
    }

    async fn handle(&self, action: GooglePlaceAction) {
        match action {
            GooglePlaceAction::SearchPlaces { query, completion } => {
                completion.complete(self.search(&query).await);
            }
            GooglePlaceAction::RetrievePlace {
                place_id,
                completion,
            } => {
                completion.complete(self.retrieve(&place_id).await);
            }
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<GooglePlace>, StoreError> {
        let response = self
            .ctx
            .remote
            .search_places(query)
            .await
            .map_err(api_error)?;
        if let Some(err) = status_error(&response.status, response.error_message) {
            return Err(err.into());
        }
        let places = response.results;
        self.writer
            .commit(move |ctx| {
                upsert_all::<StoredGooglePlace, _>(ctx, &places, false)?;
                Ok(places)
            })
            .await
    }

    async fn retrieve(&self, place_id: &str) -> Result<GooglePlace, StoreError> {
        let response = self
            .ctx
            .remote
            .place_details(place_id)
            .await
            .map_err(api_error)?;
        if let Some(err) = status_error(&response.status, response.error_message) {
            return Err(err.into());
        }
        let Some(place) = response.result else {
            return Err(ApiError::ResourceDoesNotExist.into());
        };
        let batch = [place.clone()];
        self.writer
            .commit(move |ctx| upsert_all::<StoredGooglePlace, _>(ctx, &batch, false))
            .await?;
        Ok(place)
    }
}

fn api_error(err: NetworkError) -> StoreError {
    ApiError::from_network(&err).into()
}

/// Map a Google Places `status` to an error, or `None` if the call
/// succeeded. `ZERO_RESULTS` is a success with an empty result list.
fn status_error(status: &str, message: Option<String>) -> Option<ApiError> {
    match status {
        "OK" | "ZERO_RESULTS" => None,
        "REQUEST_DENIED" => Some(ApiError::Unauthorized),
        "INVALID_REQUEST" => Some(ApiError::RequestFailed),
        "NOT_FOUND" => Some(ApiError::ResourceDoesNotExist),
        other => Some(ApiError::Unknown {
            message: message.unwrap_or_else(|| other.to_owned()),
        }),
    }
}

impl ActionsProcessor for GooglePlaceStore {
    fn on_action(&self, action: Action) {
        let Action::GooglePlace(action) = action else {
            unexpected_action(ActionKind::GooglePlace, &action);
            return;
        };
        let store = self.clone();
        self.ctx.spawn(async move { store.handle(action).await });
    }
}

impl Store for GooglePlaceStore {
    fn action_kind(&self) -> ActionKind {
        ActionKind::GooglePlace
    }
}
