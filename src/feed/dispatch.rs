use std::sync::{
    Arc, Weak,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use tokio::{
    sync::{
        broadcast::error::RecvError,
        mpsc::{self, error::TrySendError},
    },
    task::JoinHandle,
};

use super::{Change, ChangeFeed, Topic};

struct Interest {
    topic: Topic,
    tx: mpsc::Sender<Change>,
}

type Interests = DashMap<u64, Interest>;

/// One feed subscription per client session, fanned out to registered topics.
///
/// Changes reach each registration in the order the feed delivered them. Each
/// registration buffers at most the feed's capacity; past that, changes for it
/// are dropped and logged the same way a lagging feed receiver is.
pub struct Dispatcher {
    interests: Arc<Interests>,
    capacity: usize,
    next_id: AtomicU64,
    task: JoinHandle<()>,
}

impl Dispatcher {
    pub fn spawn(feed: &ChangeFeed) -> Dispatcher {
        let interests: Arc<Interests> = Arc::new(DashMap::new());
        let mut rx = feed.receiver();

        let fanout = interests.clone();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) => {
                        for interest in fanout.iter() {
                            if !interest.topic.matches(&change) {
                                continue;
                            }
                            // a closed channel is a registration mid-drop
                            if let Err(TrySendError::Full(_)) = interest.tx.try_send(change.clone()) {
                                tracing::warn!(topic = ?interest.topic, "registration full, change dropped");
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "session fell behind the change feed");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Dispatcher {
            interests,
            capacity: feed.capacity(),
            next_id: AtomicU64::new(0),
            task,
        }
    }

    pub fn register(&self, topic: Topic) -> Registration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.capacity);
        self.interests.insert(id, Interest { topic: topic.clone(), tx });
        Registration {
            id,
            topic,
            rx,
            interests: Arc::downgrade(&self.interests),
        }
    }

    pub fn registrations(&self) -> usize {
        self.interests.len()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Live interest in one topic; deregisters when dropped.
pub struct Registration {
    id: u64,
    topic: Topic,
    rx: mpsc::Receiver<Change>,
    interests: Weak<Interests>,
}

impl Registration {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Next matching change, or `None` once the dispatcher is gone.
    pub async fn recv(&mut self) -> Option<Change> {
        self.rx.recv().await
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(interests) = self.interests.upgrade() {
            interests.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::feed::{Entity, tests::message_in};

    #[tokio::test]
    async fn fans_out_by_topic_in_order() {
        let feed = ChangeFeed::new(16);
        let dispatcher = Dispatcher::spawn(&feed);
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let mut in_a = dispatcher.register(Topic::Chat(a));
        let mut in_b = dispatcher.register(Topic::Chat(b));

        feed.publish(Change::insert(Entity::Message(message_in(a, "one"))));
        feed.publish(Change::insert(Entity::Message(message_in(b, "elsewhere"))));
        feed.publish(Change::insert(Entity::Message(message_in(a, "two"))));

        let content = |change: Change| match change.entity {
            Entity::Message(m) => m.content.unwrap(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(content(in_a.recv().await.unwrap()), "one");
        assert_eq!(content(in_a.recv().await.unwrap()), "two");
        assert_eq!(content(in_b.recv().await.unwrap()), "elsewhere");
    }

    #[tokio::test]
    async fn dropping_a_registration_unsubscribes() {
        let feed = ChangeFeed::new(16);
        let dispatcher = Dispatcher::spawn(&feed);
        let registration = dispatcher.register(Topic::Inbox("u1".to_owned()));
        assert_eq!(dispatcher.registrations(), 1);
        assert_eq!(registration.topic(), &Topic::Inbox("u1".to_owned()));
        drop(registration);
        assert_eq!(dispatcher.registrations(), 0);
    }

    #[tokio::test]
    async fn a_registration_that_is_never_read_stays_bounded() {
        let feed = ChangeFeed::new(8);
        let dispatcher = Dispatcher::spawn(&feed);
        let chat = Uuid::now_v7();
        let mut registration = dispatcher.register(Topic::Chat(chat));

        for n in 0..1_000 {
            feed.publish(Change::insert(Entity::Message(message_in(chat, &n.to_string()))));
            tokio::task::yield_now().await;
        }

        let mut queued = 0;
        while registration.rx.try_recv().is_ok() {
            queued += 1;
        }
        assert!(queued > 0);
        assert!(queued <= feed.capacity());
    }

    #[tokio::test]
    async fn registrations_end_with_the_dispatcher() {
        let feed = ChangeFeed::new(16);
        let dispatcher = Dispatcher::spawn(&feed);
        let mut registration = dispatcher.register(Topic::Chat(Uuid::now_v7()));
        drop(dispatcher);
        assert!(registration.recv().await.is_none());
    }
}
