use super::driver::RoomCmd;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// What a room timer fires as when it lands back on the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// The current seat ran out their flip clock.
    TurnTimeout,
    /// The active slap window hit its deadline.
    SlapDeadline,
}

/// The room's single logical timer. Every (re)schedule bumps the generation
/// and spawns a one-shot sleeper that posts back onto the room queue; the
/// driver compares generations on receipt so stale fires fall on the floor.
#[derive(Debug)]
pub struct RoomTimer {
    generation: u64,
    tx: UnboundedSender<RoomCmd>,
}

impl RoomTimer {
    pub fn new(tx: UnboundedSender<RoomCmd>) -> Self {
        Self { generation: 0, tx }
    }
    /// Schedules the next fire, invalidating any outstanding one.
    pub fn schedule(&mut self, delay: Duration, kind: TimerKind) {
        self.generation += 1;
        let generation = self.generation;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(RoomCmd::Timer { generation, kind });
        });
    }
    /// Invalidates any outstanding fire without scheduling a new one.
    pub fn clear(&mut self) {
        self.generation += 1;
    }
    /// Whether a fired callback still speaks for the current schedule.
    pub fn current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn fires_with_current_generation() {
        let (tx, mut rx) = unbounded_channel();
        let mut timer = RoomTimer::new(tx);
        timer.schedule(Duration::from_millis(1), TimerKind::TurnTimeout);
        match rx.recv().await {
            Some(RoomCmd::Timer { generation, kind }) => {
                assert!(timer.current(generation));
                assert_eq!(kind, TimerKind::TurnTimeout);
            }
            other => panic!("expected timer fire, got {:?}", other),
        }
    }
    #[tokio::test]
    async fn reschedule_invalidates_prior_fire() {
        let (tx, mut rx) = unbounded_channel();
        let mut timer = RoomTimer::new(tx);
        timer.schedule(Duration::from_millis(1), TimerKind::TurnTimeout);
        timer.schedule(Duration::from_millis(1), TimerKind::SlapDeadline);
        let first = rx.recv().await.expect("fire");
        if let RoomCmd::Timer { generation, .. } = first {
            // one of the two fires is stale, one is live
            let second = rx.recv().await.expect("fire");
            if let RoomCmd::Timer {
                generation: other, ..
            } = second
            {
                assert_ne!(
                    timer.current(generation) && timer.current(other),
                    true,
                    "both generations cannot be live"
                );
                assert!(timer.current(generation) || timer.current(other));
            }
        }
    }
    #[tokio::test]
    async fn clear_invalidates_everything() {
        let (tx, mut rx) = unbounded_channel();
        let mut timer = RoomTimer::new(tx);
        timer.schedule(Duration::from_millis(1), TimerKind::SlapDeadline);
        timer.clear();
        if let Some(RoomCmd::Timer { generation, .. }) = rx.recv().await {
            assert!(!timer.current(generation));
        }
    }
}
