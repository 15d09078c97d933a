use crate::action::{Action, ActionKind, SiteDiscoveryAction};
use crate::dispatcher::ActionsProcessor;

use super::{Store, StoreContext, unexpected_action};

/// Inspects a site address entered on the pre-login screen.
#[derive(Clone)]
pub struct SiteDiscoveryStore {
    ctx: StoreContext,
}

impl SiteDiscoveryStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self { ctx }
    }

    async fn handle(&self, action: SiteDiscoveryAction) {
        match action {
            SiteDiscoveryAction::FetchSiteInfo {
                site_address,
                completion,
            } => {
                let result = self.ctx.remote.site_info(&site_address).await;
                completion.complete(result.map_err(Into::into));
            }
        }
    }
}

impl ActionsProcessor for SiteDiscoveryStore {
    fn on_action(&self, action: Action) {
        let Action::SiteDiscovery(action) = action else {
            unexpected_action(ActionKind::SiteDiscovery, &action);
            return;
        };
        let store = self.clone();
        self.ctx.spawn(async move { store.handle(action).await });
    }
}

impl Store for SiteDiscoveryStore {
    fn action_kind(&self) -> ActionKind {
        ActionKind::SiteDiscovery
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::network::Method;
    use crate::stores::test_support::context;
    use crate::testing::StubNetwork;

    #[tokio::test]
    async fn site_info_is_fetched_for_address() {
        let stub = StubNetwork::new();
        stub.respond(
            Method::Get,
            "/mate/v1/site-info",
            json!({"url": "https://shop.example", "is_wordpress": true, "has_jetpack": true}),
        );
        let store = SiteDiscoveryStore::new(context(&stub));

        let (action, pending) = SiteDiscoveryAction::fetch_site_info("shop.example");
        store.on_action(action);

        let info = pending.await.expect("fetch should succeed");
        assert!(info.is_wordpress && info.has_jetpack && !info.is_wpcom);
        let sent = stub.requests();
        assert!(sent[0].query.contains(&("url".to_owned(), "shop.example".to_owned())));
    }
}
