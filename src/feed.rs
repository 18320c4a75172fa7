//! Live feed binder: counts pushed items of a channel for a list view.
//!
//! While enabled, every recognized push bumps a pending counter and shows a
//! "new items" banner. Acknowledging resets both and reloads page one of the
//! bound [PageStore].

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::{
    api::PageSource,
    filter::{self, Filter},
    store::{LoadOutcome, PageStore},
    ws::{Connection, ConnectionEvent, EventKind, HandlerId, Message},
};

/// Counter state of a [LiveFeed]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedState {
    /// recognized pushes since last acknowledge
    pub pending: u64,
    /// banner should be shown
    pub banner_visible: bool,
}

/// Binds push channel messages to a [PageStore]
pub struct LiveFeed<S> {
    connection: Connection,
    store: Arc<PageStore<S>>,
    filter: Arc<dyn Filter>,
    merge: bool,
    state: Arc<watch::Sender<FeedState>>,
    subscription: Mutex<Option<HandlerId>>,
}

impl<S> std::fmt::Debug for LiveFeed<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveFeed")
            .field("merge", &self.merge)
            .field("state", &*self.state.borrow())
            .field("subscription", &self.subscription)
            .finish()
    }
}

impl<S: PageSource + 'static> LiveFeed<S> {
    /// Create a disabled binder counting `new_event` and `new_activity` pushes
    pub fn new(connection: Connection, store: Arc<PageStore<S>>) -> Self {
        Self::with_filter(connection, store, filter::new_item())
    }

    /// Create a disabled binder counting pushes that pass `filter`
    pub fn with_filter<F: Filter + 'static>(
        connection: Connection,
        store: Arc<PageStore<S>>,
        filter: F,
    ) -> Self {
        let (state, _) = watch::channel(FeedState::default());
        Self {
            connection,
            store,
            filter: Arc::new(filter),
            merge: false,
            state: Arc::new(state),
            subscription: Mutex::new(None),
        }
    }

    /// Insert pushed items into the store right away instead of counting them.
    ///
    /// Pushes without a valid item are still counted.
    pub fn merging(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }

    /// Start counting, does nothing if already enabled
    pub fn enable(&self) {
        let mut subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if subscription.is_some() {
            return;
        }

        let filter = Arc::clone(&self.filter);
        let state = Arc::clone(&self.state);
        let store = Arc::clone(&self.store);
        let merge = self.merge;

        let id = self
            .connection
            .on(EventKind::Message, move |event: &ConnectionEvent| {
                if let ConnectionEvent::Message(message) = event {
                    on_message(message, filter.as_ref(), &state, &store, merge);
                }
            });

        log::debug!("Live feed enabled");
        *subscription = Some(id);
    }

    /// Stop counting, does nothing if not enabled. The counter is kept.
    pub fn disable(&self) {
        let id = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(id) = id {
            self.connection.off(EventKind::Message, id);
            log::debug!("Live feed disabled");
        }
    }

    /// Check if counting
    pub fn is_enabled(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Reset counter, hide banner and reload page one with current filters.
    pub async fn acknowledge(&self) -> Result<LoadOutcome, S::Error> {
        self.state.send_modify(|state| *state = FeedState::default());
        self.store.refresh().await
    }

    /// Current counter state
    pub fn state(&self) -> FeedState {
        *self.state.borrow()
    }

    /// Watch counter changes
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    /// The bound store
    pub fn store(&self) -> &Arc<PageStore<S>> {
        &self.store
    }

    /// The connection pushes come from
    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

fn on_message<S: PageSource>(
    message: &Message,
    filter: &dyn Filter,
    state: &watch::Sender<FeedState>,
    store: &PageStore<S>,
    merge: bool,
) {
    if !filter.filter_message(message) {
        return;
    }

    if merge {
        if let Some(item) = message.item() {
            store.merge_live_item(item);
            return;
        }
    }

    state.send_modify(|state| {
        state.pending += 1;
        state.banner_visible = true;
    });
    log::trace!("Pending {} pushes", state.borrow().pending);
}

impl<S> Drop for LiveFeed<S> {
    fn drop(&mut self) {
        let id = self
            .subscription
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = id {
            self.connection.off(EventKind::Message, id);
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use snafu::prelude::*;

    use super::*;
    use crate::api::{
        types::{Filters, Item, Page},
        FetchError,
    };

    #[derive(Debug, Snafu)]
    #[snafu(display("never fails"))]
    struct Never;

    impl FetchError for Never {
        fn is_unreachable(&self) -> bool {
            false
        }
    }

    #[derive(Debug, Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl PageSource for CountingSource {
        type Error = Never;

        async fn fetch_page(&self, _: &Filters, _: Option<&str>) -> Result<Page, Never> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Page {
                items: vec![Item::from_value(json!({ "id": format!("p{}", n) })).unwrap()],
                ..Page::default()
            })
        }
    }

    fn push(kind: &str, id: &str) -> ConnectionEvent {
        let message = match kind {
            "new_event" => Message::NewEvent {
                event: json!({ "id": id }),
            },
            "new_activity" => Message::NewActivity {
                activity: json!({ "id": id }),
            },
            _ => Message::Pong { message: None },
        };
        ConnectionEvent::Message(message)
    }

    fn setup() -> (Connection, LiveFeed<CountingSource>) {
        let connection = Connection::new();
        let store = Arc::new(PageStore::new(CountingSource::default(), Default::default()));
        let feed = LiveFeed::with_filter(connection.clone(), store, filter::kind("new_event"));
        (connection, feed)
    }

    #[tokio::test]
    async fn test_count_and_acknowledge() {
        let (connection, feed) = setup();
        feed.enable();

        for i in 0..3 {
            connection.inject(&push("new_event", &format!("e{}", i)));
        }
        connection.inject(&push("new_activity", "a1"));
        connection.inject(&push("pong", ""));

        assert_eq!(
            feed.state(),
            FeedState {
                pending: 3,
                banner_visible: true
            }
        );

        let outcome = feed.acknowledge().await.unwrap();

        assert_eq!(outcome, LoadOutcome::Loaded);
        assert_eq!(feed.state(), FeedState::default());
        assert_eq!(feed.store().source().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_enable_disable_idempotent() {
        let (connection, feed) = setup();

        feed.enable();
        feed.enable();
        connection.inject(&push("new_event", "e1"));
        assert_eq!(feed.state().pending, 1);

        feed.disable();
        feed.disable();
        assert!(!feed.is_enabled());
        connection.inject(&push("new_event", "e2"));
        assert_eq!(feed.state().pending, 1);

        feed.enable();
        connection.inject(&push("new_event", "e3"));
        assert_eq!(feed.state().pending, 2);
    }

    #[tokio::test]
    async fn test_subscribe_sees_changes() {
        let (connection, feed) = setup();
        let mut rx = feed.subscribe();
        feed.enable();

        connection.inject(&push("new_event", "e1"));

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().pending, 1);
    }

    #[tokio::test]
    async fn test_merge_mode() {
        let connection = Connection::new();
        let store = Arc::new(PageStore::new(CountingSource::default(), Default::default()));
        let feed = LiveFeed::new(connection.clone(), Arc::clone(&store)).merging(true);
        feed.enable();

        connection.inject(&push("new_activity", "a1"));
        connection.inject(&push("new_activity", "a1"));
        connection.inject(&ConnectionEvent::Message(Message::NewEvent {
            event: json!({"no": "id"}),
        }));

        let ids: Vec<String> = store.items().iter().map(|i| i.id().to_string()).collect();
        assert_eq!(ids, vec!["a1"]);
        assert_eq!(feed.state().pending, 1);
    }

    #[tokio::test]
    async fn test_push_without_item_is_counted() {
        let (connection, feed) = setup();
        feed.enable();

        let bare = Message::decode(r#"{"type": "new_event"}"#).unwrap();
        connection.inject(&ConnectionEvent::Message(bare));

        assert_eq!(feed.state().pending, 1);
        assert!(feed.store().items().is_empty());
    }

    #[tokio::test]
    async fn test_drop_unregisters() {
        let (connection, feed) = setup();
        feed.enable();
        let store = Arc::clone(feed.store());
        drop(feed);

        connection.inject(&push("new_event", "e1"));
        assert_eq!(Arc::strong_count(&store), 1);
    }
}
