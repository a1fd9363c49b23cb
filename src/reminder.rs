//! Appointment reminders: a one-shot deferred task fired ahead of the
//! appointment, delivered through a [`Notifier`].
//!
//! Scheduling is best-effort. Nothing here returns an error to the booking
//! flow that asked for the reminder.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::push::Notifier;
use crate::tasks::{DeferredTask, TaskQueue};

pub const REMINDER_KIND: &str = "reminder";
pub const REMINDER_TITLE: &str = "Appointment reminder";
const CLAIM_BATCH: i64 = 20;
const MIN_POLL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderJob {
    pub booking_id: i64,
    pub barber_name: String,
    pub date: String,
    pub time: String,
}

impl ReminderJob {
    pub fn body(&self) -> String {
        format!(
            "You have an appointment with {} on {} at {}. Don't forget to arrive on time.",
            self.barber_name, self.date, self.time
        )
    }
}

pub fn reminder_tag(booking_id: i64) -> String {
    format!("reminder_{booking_id}")
}

/// Combines `YYYY-MM-DD` and `HH:MM[:SS[.fff]]` into a local timestamp.
pub fn parse_appointment(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    let time = time.trim();
    let time = NaiveTime::parse_from_str(time, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
        .ok()?;
    Some(date.and_time(time))
}

pub struct ReminderScheduler {
    queue: Arc<dyn TaskQueue>,
    lead: chrono::Duration,
}

impl ReminderScheduler {
    pub fn new(queue: Arc<dyn TaskQueue>, lead: chrono::Duration) -> Self {
        Self { queue, lead }
    }

    pub fn queue(&self) -> &Arc<dyn TaskQueue> {
        &self.queue
    }

    pub async fn schedule(&self, booking_id: i64, barber_name: &str, date: &str, time: &str) {
        self.schedule_at(Local::now().naive_local(), booking_id, barber_name, date, time)
            .await;
    }

    /// Same as [`schedule`](Self::schedule) against an explicit `now`.
    /// Returns the fire time when a task was enqueued.
    pub async fn schedule_at(
        &self,
        now: NaiveDateTime,
        booking_id: i64,
        barber_name: &str,
        date: &str,
        time: &str,
    ) -> Option<NaiveDateTime> {
        let Some(appointment) = parse_appointment(date, time) else {
            log::warn!("Reminder for booking {booking_id} skipped: cannot parse {date} {time}");
            return None;
        };

        let fire_at = appointment - self.lead;
        if fire_at <= now {
            log::debug!("Reminder for booking {booking_id} skipped: {fire_at} is not in the future");
            return None;
        }

        let job = ReminderJob {
            booking_id,
            barber_name: barber_name.to_string(),
            date: date.to_string(),
            time: time.to_string(),
        };
        let payload = match serde_json::to_value(&job) {
            Ok(payload) => payload,
            Err(err) => {
                log::warn!("Reminder for booking {booking_id} skipped: {err}");
                return None;
            }
        };

        let task = DeferredTask::new(REMINDER_KIND, reminder_tag(booking_id), payload, fire_at);
        match self.queue.enqueue(task).await {
            Ok(()) => {
                log::info!("Reminder for booking {booking_id} scheduled at {fire_at}");
                Some(fire_at)
            }
            Err(err) => {
                log::warn!("Reminder for booking {booking_id} not stored: {err}");
                None
            }
        }
    }

    pub async fn cancel(&self, booking_id: i64) {
        match self.queue.cancel_tag(&reminder_tag(booking_id)).await {
            Ok(0) => {}
            Ok(count) => log::info!("Cancelled {count} reminder(s) for booking {booking_id}"),
            Err(err) => log::warn!("Could not cancel reminder for booking {booking_id}: {err}"),
        }
    }

    /// Drops the booking's pending reminder and schedules a fresh one.
    pub async fn reschedule(&self, booking_id: i64, barber_name: &str, date: &str, time: &str) {
        self.cancel(booking_id).await;
        self.schedule(booking_id, barber_name, date, time).await;
    }
}

/// Polls the queue and fires due reminders.
pub struct ReminderWorker {
    queue: Arc<dyn TaskQueue>,
    notifier: Arc<dyn Notifier>,
    poll: Duration,
}

impl ReminderWorker {
    pub fn new(queue: Arc<dyn TaskQueue>, notifier: Arc<dyn Notifier>, poll: Duration) -> Self {
        Self {
            queue,
            notifier,
            // tokio's interval rejects a zero period.
            poll: poll.max(MIN_POLL),
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        match self.queue.recover_running().await {
            Ok(0) => {}
            Ok(count) => log::info!("Requeued {count} interrupted reminder(s)"),
            Err(err) => log::warn!("Could not requeue interrupted reminders: {err}"),
        }
        match self.queue.prune_failed().await {
            Ok(0) => {}
            Ok(count) => log::info!("Pruned {count} failed reminder(s)"),
            Err(err) => log::warn!("Could not prune failed reminders: {err}"),
        }

        let mut ticker = tokio::time::interval(self.poll);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.fire_due(Local::now().naive_local()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        log::info!("Reminder worker stopping");
                        return;
                    }
                }
            }
        }
    }

    /// Fires every reminder due at `now`; returns how many were delivered.
    pub async fn fire_due(&self, now: NaiveDateTime) -> usize {
        let tasks = match self.queue.claim_due(now, CLAIM_BATCH).await {
            Ok(tasks) => tasks,
            Err(err) => {
                log::warn!("Could not claim due reminders: {err}");
                return 0;
            }
        };

        let mut fired = 0;
        for task in tasks {
            if task.kind != REMINDER_KIND {
                self.finish(&task.id, Err(format!("unexpected task kind {}", task.kind)))
                    .await;
                continue;
            }

            match serde_json::from_value::<ReminderJob>(task.payload.clone()) {
                Ok(job) => {
                    log::info!("Firing reminder for booking {}", job.booking_id);
                    self.notifier
                        .notify(job.booking_id, REMINDER_TITLE, &job.body())
                        .await;
                    self.finish(&task.id, Ok(())).await;
                    fired += 1;
                }
                Err(err) => {
                    log::warn!("Reminder task {} has a malformed payload: {err}", task.id);
                    self.finish(&task.id, Err(err.to_string())).await;
                }
            }
        }
        fired
    }

    async fn finish(&self, id: &str, outcome: Result<(), String>) {
        let result = match outcome {
            Ok(()) => self.queue.complete(id).await,
            Err(error) => self.queue.fail(id, &error).await,
        };
        if let Err(err) = result {
            log::warn!("Could not record outcome of task {id}: {err}");
        }
    }
}
