//! Routes actions to the processors registered for their family.

use std::collections::HashMap;
use std::sync::Arc;

use crate::action::{Action, ActionKind};

/// Anything that can receive actions from a [`Dispatcher`].
///
/// `on_action` runs synchronously on the dispatching thread, so
/// implementations hand any slow work off to a task and return promptly.
pub trait ActionsProcessor: Send + Sync + 'static {
    fn on_action(&self, action: Action);
}

/// Routing table from [`ActionKind`] to registered processors.
///
/// Registration is additive: every processor registered for a kind
/// receives each action of that kind, in registration order. The action's
/// completion is shared between the copies, so the caller still observes
/// a single answer.
#[derive(Default)]
pub struct Dispatcher {
    processors: HashMap<ActionKind, Vec<Arc<dyn ActionsProcessor>>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self
            .processors
            .iter()
            .map(|(kind, list)| (*kind, list.len()))
            .collect();
        kinds.sort();
        f.debug_struct("Dispatcher").field("kinds", &kinds).finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `processor` for actions of `kind`.
    ///
    /// Registering the same processor (the same `Arc` allocation) for the
    /// same kind again has no effect.
    pub fn register(&mut self, processor: Arc<dyn ActionsProcessor>, kind: ActionKind) {
        let list = self.processors.entry(kind).or_default();
        if list.iter().any(|p| Arc::ptr_eq(p, &processor)) {
            return;
        }
        list.push(processor);
        tracing::debug!(kind = %kind, processors = list.len(), "processor registered");
    }

    /// Remove `processor` from every kind it was registered for.
    pub fn unregister(&mut self, processor: &Arc<dyn ActionsProcessor>) {
        for list in self.processors.values_mut() {
            list.retain(|p| !Arc::ptr_eq(p, processor));
        }
        self.processors.retain(|_, list| !list.is_empty());
    }

    /// Remove every registration.
    pub fn clear(&mut self) {
        self.processors.clear();
    }

    /// Number of processors registered for `kind`.
    pub fn processor_count(&self, kind: ActionKind) -> usize {
        self.processors.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `action` to every processor registered for its kind.
    ///
    /// With no processor registered the action is dropped, which resolves
    /// the caller's [`Pending`](crate::Pending) to
    /// [`DispatchError::Dropped`](crate::DispatchError::Dropped).
    pub fn dispatch(&self, action: Action) {
        let kind = action.kind();
        let dispatch_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!(
            "dispatch",
            action = action.name(),
            kind = %kind,
            %dispatch_id
        );
        let _enter = span.enter();

        let Some((last, rest)) = self
            .processors
            .get(&kind)
            .and_then(|list| list.split_last())
        else {
            tracing::warn!("no processor registered; dropping action");
            return;
        };
        for processor in rest {
            processor.on_action(action.clone());
        }
        last.on_action(action);
    }

    /// Deliver each action in order.
    pub fn dispatch_all(&self, actions: impl IntoIterator<Item = Action>) {
        for action in actions {
            self.dispatch(action);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::action::{EventAction, SupportAction, SystemStatusAction};
    use crate::error::DispatchError;
    use crate::model::SupportTicket;

    /// Records the name of every action it receives.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<&'static str>>,
    }

    impl Recorder {
        fn seen(&self) -> Vec<&'static str> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl ActionsProcessor for Recorder {
        fn on_action(&self, action: Action) {
            self.seen.lock().unwrap().push(action.name());
        }
    }

    fn ticket() -> SupportTicket {
        SupportTicket {
            subject: "Help".into(),
            message: "Broken".into(),
            email: "me@example.com".into(),
            tags: Vec::new(),
        }
    }

    #[test]
    fn routes_only_to_matching_kind() {
        let events = Arc::new(Recorder::default());
        let status = Arc::new(Recorder::default());
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(events.clone(), ActionKind::Event);
        dispatcher.register(status.clone(), ActionKind::SystemStatus);

        dispatcher.dispatch(EventAction::delete_event(1).0);

        assert_eq!(events.seen(), vec!["delete_event"]);
        assert!(status.seen().is_empty());
    }

    #[test]
    fn registration_is_additive() {
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(first.clone(), ActionKind::Event);
        dispatcher.register(second.clone(), ActionKind::Event);

        dispatcher.dispatch(EventAction::retrieve_event(7).0);

        assert_eq!(first.seen(), vec!["retrieve_event"]);
        assert_eq!(second.seen(), vec!["retrieve_event"]);
        assert_eq!(dispatcher.processor_count(ActionKind::Event), 2);
    }

    #[test]
    fn same_processor_registers_once() {
        let recorder = Arc::new(Recorder::default());
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(recorder.clone(), ActionKind::Event);
        dispatcher.register(recorder.clone(), ActionKind::Event);

        dispatcher.dispatch(EventAction::delete_event(1).0);

        assert_eq!(recorder.seen().len(), 1);
        assert_eq!(dispatcher.processor_count(ActionKind::Event), 1);
    }

    #[test]
    fn unregister_removes_from_all_kinds() {
        let recorder: Arc<dyn ActionsProcessor> = Arc::new(Recorder::default());
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Arc::clone(&recorder), ActionKind::Event);
        dispatcher.register(Arc::clone(&recorder), ActionKind::Support);

        dispatcher.unregister(&recorder);

        assert_eq!(dispatcher.processor_count(ActionKind::Event), 0);
        assert_eq!(dispatcher.processor_count(ActionKind::Support), 0);
    }

    #[test]
    fn dispatch_all_preserves_order() {
        let recorder = Arc::new(Recorder::default());
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(recorder.clone(), ActionKind::Event);

        dispatcher.dispatch_all([
            EventAction::retrieve_event(1).0,
            EventAction::delete_event(1).0,
        ]);

        assert_eq!(recorder.seen(), vec!["retrieve_event", "delete_event"]);
    }

    #[tokio::test]
    async fn unrouted_action_is_observably_dropped() {
        let dispatcher = Dispatcher::new();
        let (action, pending) = SupportAction::create_ticket(ticket());

        dispatcher.dispatch(action);

        assert!(matches!(pending.await, Err(DispatchError::Dropped)));
    }

    #[tokio::test]
    async fn processor_that_ignores_action_drops_it() {
        let recorder = Arc::new(Recorder::default());
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(recorder.clone(), ActionKind::SystemStatus);
        let (action, pending) = SystemStatusAction::fetch_system_status();

        dispatcher.dispatch(action);

        assert_eq!(recorder.seen(), vec!["fetch_system_status"]);
        assert!(matches!(pending.await, Err(DispatchError::Dropped)));
    }
}
