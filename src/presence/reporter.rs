use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    time::{Instant, MissedTickBehavior},
};

use crate::db::{PresenceSink, models::PresenceStatus};

/// What the session wants the profile to say. A `Final` value is written once
/// and ends the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Desired {
    Live { visible: bool },
    Final(PresenceStatus),
}

impl Desired {
    fn status(self) -> PresenceStatus {
        match self {
            Desired::Live { visible: true } => PresenceStatus::Online,
            Desired::Live { visible: false } => PresenceStatus::Away,
            Desired::Final(status) => status,
        }
    }
}

/// Best-effort liveness for one client session.
///
/// All writes for a session go through one writer task, so they land in the
/// order they were asked for and the last call wins. Intermediate states may
/// be coalesced. Failures are logged at debug and never reach the caller.
pub struct PresenceReporter {
    desired: watch::Sender<Desired>,
}

impl PresenceReporter {
    /// Reports online now and on every `period` while visible, away while hidden.
    pub fn start<S: PresenceSink + ?Sized + 'static>(sink: Arc<S>, user_id: String, period: Duration) -> PresenceReporter {
        let (desired, watcher) = watch::channel(Desired::Live { visible: true });
        let first_beat = Instant::now() + period;
        tokio::spawn(drive(sink, user_id, period, first_beat, watcher));
        PresenceReporter { desired }
    }

    pub fn is_visible(&self) -> bool {
        matches!(*self.desired.borrow(), Desired::Live { visible: true })
    }

    /// Writes immediately instead of waiting for the next beat.
    pub fn set_visible(&self, visible: bool) {
        self.desired.send_replace(Desired::Live { visible });
    }

    /// The client navigated away within the app; it is still running.
    pub fn unmount(self) {
        self.desired.send_replace(Desired::Final(PresenceStatus::Away));
    }

    pub fn end_session(self) {
        self.desired.send_replace(Desired::Final(PresenceStatus::Offline));
    }
}

/// The session's single writer. An unseen final value is still delivered
/// after the reporter is gone; a reporter dropped without one just stops.
async fn drive<S: PresenceSink + ?Sized>(
    sink: Arc<S>,
    user_id: String,
    period: Duration,
    first_beat: Instant,
    mut desired: watch::Receiver<Desired>,
) {
    let mut ticker = tokio::time::interval_at(first_beat, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    write(&*sink, &user_id, PresenceStatus::Online).await;
    let mut current = Desired::Live { visible: true };
    while !matches!(current, Desired::Final(_)) {
        let changed = tokio::select! {
            biased;
            changed = desired.changed() => Some(changed),
            _ = ticker.tick() => None,
        };
        match changed {
            Some(Err(_)) => return,
            Some(Ok(())) => current = *desired.borrow_and_update(),
            None => {}
        }
        write(&*sink, &user_id, current.status()).await;
    }
}

async fn write<S: PresenceSink + ?Sized>(sink: &S, user_id: &str, status: PresenceStatus) {
    if let Err(err) = sink.set_presence(user_id, status).await {
        tracing::debug!(user_id, %status, error = %err, "presence write dropped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{AppError, AppResult};

    #[derive(Default)]
    struct Recorder {
        writes: Mutex<Vec<PresenceStatus>>,
        failing: bool,
        slow_online: Option<Duration>,
    }

    impl Recorder {
        fn writes(&self) -> Vec<PresenceStatus> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PresenceSink for Recorder {
        async fn set_presence(&self, _user_id: &str, status: PresenceStatus) -> AppResult<()> {
            if let (PresenceStatus::Online, Some(delay)) = (status, self.slow_online) {
                tokio::time::sleep(delay).await;
            }
            self.writes.lock().unwrap().push(status);
            if self.failing {
                return Err(AppError::from("backend down"));
            }
            Ok(())
        }
    }

    const PERIOD: Duration = Duration::from_secs(25);

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn online_on_start_then_heartbeat_follows_visibility() {
        use PresenceStatus::*;
        let sink = Arc::new(Recorder::default());
        let reporter = PresenceReporter::start(sink.clone(), "u1".into(), PERIOD);
        settle().await;
        assert_eq!(sink.writes(), [Online]);

        tokio::time::advance(PERIOD).await;
        settle().await;
        assert_eq!(sink.writes(), [Online, Online]);

        reporter.set_visible(false);
        settle().await;
        assert_eq!(sink.writes(), [Online, Online, Away]);

        tokio::time::advance(PERIOD).await;
        settle().await;
        assert_eq!(sink.writes(), [Online, Online, Away, Away]);

        reporter.set_visible(true);
        settle().await;
        assert_eq!(sink.writes().last(), Some(&Online));
    }

    #[tokio::test(start_paused = true)]
    async fn end_session_reports_offline_and_stops_beating() {
        let sink = Arc::new(Recorder::default());
        let reporter = PresenceReporter::start(sink.clone(), "u1".into(), PERIOD);
        reporter.end_session();
        settle().await;

        tokio::time::advance(PERIOD * 3).await;
        settle().await;
        assert_eq!(sink.writes(), [PresenceStatus::Online, PresenceStatus::Offline]);
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_reports_away() {
        let sink = Arc::new(Recorder::default());
        let reporter = PresenceReporter::start(sink.clone(), "u1".into(), PERIOD);
        settle().await;
        reporter.unmount();
        settle().await;
        assert_eq!(sink.writes().last(), Some(&PresenceStatus::Away));
    }

    #[tokio::test(start_paused = true)]
    async fn a_slow_online_write_never_lands_after_offline() {
        let sink = Arc::new(Recorder {
            slow_online: Some(Duration::from_millis(30)),
            ..Recorder::default()
        });
        let reporter = PresenceReporter::start(sink.clone(), "u1".into(), PERIOD);
        reporter.end_session();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sink.writes().last(), Some(&PresenceStatus::Offline));
    }

    #[tokio::test(start_paused = true)]
    async fn the_last_visibility_flip_wins() {
        let sink = Arc::new(Recorder {
            slow_online: Some(Duration::from_millis(30)),
            ..Recorder::default()
        });
        let reporter = PresenceReporter::start(sink.clone(), "u1".into(), PERIOD);
        reporter.set_visible(true);
        reporter.set_visible(false);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sink.writes().last(), Some(&PresenceStatus::Away));
        assert!(!reporter.is_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_swallowed() {
        let sink = Arc::new(Recorder { failing: true, ..Recorder::default() });
        let reporter = PresenceReporter::start(sink.clone(), "u1".into(), PERIOD);
        tokio::time::advance(PERIOD).await;
        settle().await;
        reporter.set_visible(false);
        settle().await;
        assert_eq!(sink.writes().len(), 3);
        assert!(!reporter.is_visible());
    }
}
