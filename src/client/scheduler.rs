//! Round countdown and item notification queue.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

const TICK: Duration = Duration::from_secs(1);

/// Where the current round's countdown stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundPhase {
    #[default]
    Idle,
    Running { remaining: u32 },
    Expired,
}

/// Result of one countdown step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Counting { remaining: u32 },
    /// The clock hit zero. Reported once per round.
    Expired,
}

/// Countdown for one question. `Idle -> Running(n) -> Expired`, restarted by
/// the next question.
#[derive(Debug, Clone)]
pub struct RoundTimer {
    duration: u32,
    phase: RoundPhase,
}

impl RoundTimer {
    pub fn new(duration: u32) -> Self {
        Self {
            duration,
            phase: RoundPhase::Idle,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn remaining(&self) -> Option<u32> {
        match self.phase {
            RoundPhase::Running { remaining } => Some(remaining),
            RoundPhase::Expired => Some(0),
            RoundPhase::Idle => None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.phase == RoundPhase::Expired
    }

    /// Restart at full duration, whatever the current phase.
    pub fn start(&mut self) {
        self.phase = RoundPhase::Running {
            remaining: self.duration,
        };
    }

    pub fn stop(&mut self) {
        self.phase = RoundPhase::Idle;
    }

    /// One second elapsed. Stale ticks outside `Running` are ignored.
    pub fn tick(&mut self) -> Option<TickOutcome> {
        let RoundPhase::Running { remaining } = self.phase else {
            return None;
        };

        let remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            self.phase = RoundPhase::Expired;
            Some(TickOutcome::Expired)
        } else {
            self.phase = RoundPhase::Running { remaining };
            Some(TickOutcome::Counting { remaining })
        }
    }
}

/// A message about an item that hit or was fired by the local player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationItem {
    pub message: String,
    pub created_at: Instant,
}

/// FIFO of notifications, each visible for a fixed window after creation.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    items: VecDeque<NotificationItem>,
    window: Duration,
}

impl NotificationQueue {
    pub fn new(window: Duration) -> Self {
        Self {
            items: VecDeque::new(),
            window,
        }
    }

    pub fn push(&mut self, message: String, now: Instant) -> NotificationItem {
        let item = NotificationItem {
            message,
            created_at: now,
        };
        self.items.push_back(item.clone());
        item
    }

    /// Drop every notification whose window has passed. Returns how many.
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.items.len();
        while self
            .items
            .front()
            .is_some_and(|item| item.created_at + self.window <= now)
        {
            self.items.pop_front();
        }
        before - self.items.len()
    }

    pub fn clear(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        count
    }

    /// When the oldest notification leaves the screen.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.items.front().map(|item| item.created_at + self.window)
    }

    pub fn visible(&self) -> Vec<NotificationItem> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Owns the round countdown, its one-second tick source and the
/// notification queue. At most one tick source exists at a time.
#[derive(Debug)]
pub struct RoundScheduler {
    timer: RoundTimer,
    ticks: Option<Interval>,
    notifications: NotificationQueue,
}

impl RoundScheduler {
    pub fn new(round_seconds: u32, notification_window: Duration) -> Self {
        Self {
            timer: RoundTimer::new(round_seconds),
            ticks: None,
            notifications: NotificationQueue::new(notification_window),
        }
    }

    pub fn timer(&self) -> &RoundTimer {
        &self.timer
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    /// Begin a fresh countdown, replacing any running one.
    pub fn start_round(&mut self) {
        // Drop the old tick source before creating its replacement.
        self.ticks = None;
        let mut ticks = interval_at(Instant::now() + TICK, TICK);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticks = Some(ticks);
        self.timer.start();
    }

    pub fn stop_round(&mut self) {
        self.ticks = None;
        self.timer.stop();
    }

    /// Tear down the tick source and forget queued notifications.
    pub fn shutdown(&mut self) {
        self.stop_round();
        self.notifications.clear();
    }

    pub fn is_ticking(&self) -> bool {
        self.ticks.is_some()
    }

    /// Resolves on the next countdown tick; never resolves while idle.
    pub async fn next_tick(&mut self) {
        match self.ticks.as_mut() {
            Some(ticks) => {
                ticks.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Apply one elapsed second. On expiry the tick source is released and
    /// the notification queue is flushed.
    pub fn on_tick(&mut self) -> Option<TickOutcome> {
        let outcome = self.timer.tick();
        if outcome.is_none() || outcome == Some(TickOutcome::Expired) {
            self.ticks = None;
        }
        if outcome == Some(TickOutcome::Expired) {
            self.notifications.clear();
        }
        outcome
    }

    pub fn notify(&mut self, message: String, now: Instant) -> NotificationItem {
        self.notifications.push(message, now)
    }

    pub fn expire_notifications(&mut self, now: Instant) -> usize {
        self.notifications.expire(now)
    }

    pub fn next_notification_deadline(&self) -> Option<Instant> {
        self.notifications.next_deadline()
    }
}

/// Sleep until `deadline`, or forever if there is none.
pub(crate) async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
