//! Background sampling and persistence loop.

use crate::error::{EnviroError, Result};
use crate::hardware::{DisplayPanel, SharedFan};
use crate::sensors::SensorArray;
use crate::shutdown::Shutdown;
use crate::snapshot::ReadingSnapshot;
use crate::storage::PersistenceStore;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, Timelike};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Wall-clock grid on which readings are persisted.
///
/// The first slot is computed once; every firing then advances it by exactly
/// one interval, so slow writes never shift the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistSchedule {
    next: NaiveDateTime,
    interval: ChronoDuration,
}

impl PersistSchedule {
    /// First slot after `now`: `HH:interval` while still inside the first
    /// interval of the hour, otherwise the top of the next hour. An hourly
    /// interval always starts at the top of the next hour.
    pub fn starting_at(now: NaiveDateTime, interval_minutes: u32) -> Self {
        let minute_start = now
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now);
        let hour_start = minute_start.with_minute(0).unwrap_or(minute_start);

        let next = match minute_start.with_minute(interval_minutes) {
            Some(slot) if now.minute() < interval_minutes => slot,
            _ => hour_start + ChronoDuration::hours(1),
        };

        Self {
            next,
            interval: ChronoDuration::minutes(i64::from(interval_minutes)),
        }
    }

    /// Schedule whose first slot is `next`.
    pub fn with_next(next: NaiveDateTime, interval_minutes: u32) -> Self {
        Self {
            next,
            interval: ChronoDuration::minutes(i64::from(interval_minutes)),
        }
    }

    pub fn next(&self) -> NaiveDateTime {
        self.next
    }

    /// Whether a save is due at `now`; if so the slot advances by one interval.
    pub fn due(&mut self, now: NaiveDateTime) -> bool {
        if now >= self.next {
            self.next += self.interval;
            true
        } else {
            false
        }
    }
}

/// Drives sample and persist ticks from one background task.
pub struct Scheduler {
    sensors: SensorArray,
    snapshot: Arc<ReadingSnapshot>,
    store: PersistenceStore,
    display: Option<DisplayPanel>,
    idle_time: Duration,
    schedule: PersistSchedule,
}

impl Scheduler {
    pub fn new(
        sensors: SensorArray,
        snapshot: Arc<ReadingSnapshot>,
        store: PersistenceStore,
        idle_time: Duration,
        save_interval_minutes: u32,
    ) -> Self {
        Self {
            sensors,
            snapshot,
            store,
            display: None,
            idle_time,
            schedule: PersistSchedule::starting_at(Local::now().naive_local(), save_interval_minutes),
        }
    }

    pub fn with_display(mut self, display: DisplayPanel) -> Self {
        self.display = Some(display);
        self
    }

    pub fn with_schedule(mut self, schedule: PersistSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Start the loop on its own task.
    pub fn spawn(self, shutdown: Shutdown) -> SchedulerHandle {
        let task = tokio::spawn(self.run(shutdown.clone()));
        SchedulerHandle { shutdown, task }
    }

    /// Run until shutdown, returning the display so it can be powered off.
    ///
    /// Each cycle waits one idle period, samples, then persists if a slot is
    /// due. Shutdown ends the loop between cycles, never mid-tick.
    pub async fn run(mut self, shutdown: Shutdown) -> Option<DisplayPanel> {
        info!(
            "Scheduler started: sampling every {:?}, next save at {}",
            self.idle_time,
            self.schedule.next()
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.idle_time) => {}
                _ = shutdown.raised() => break,
            }
            if shutdown.is_raised() {
                break;
            }

            self.sample_tick(&shutdown).await;
            self.persist_tick(Local::now().naive_local()).await;
        }

        info!("Scheduler stopped");
        self.display
    }

    async fn sample_tick(&mut self, shutdown: &Shutdown) {
        let reading = match self.sensors.sample(shutdown).await {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Sample abandoned: {}", e);
                return;
            }
        };

        let previous = self.snapshot.set(reading);
        if let Some(display) = self.display.as_mut() {
            let current = self.snapshot.get();
            if let Err(e) = display.show(&current, &previous) {
                warn!("Display update failed: {}", e);
            }
        }
    }

    async fn persist_tick(&mut self, now: NaiveDateTime) {
        if !self.schedule.due(now) {
            return;
        }

        let reading = self.snapshot.get();
        match self.store.append(now.date(), &reading).await {
            Ok(()) => debug!("Readings saved at {}", now.format("%H:%M")),
            Err(e) => error!("Error saving readings: {}", e),
        }
    }
}

/// Handle to a running scheduler.
pub struct SchedulerHandle {
    shutdown: Shutdown,
    task: JoinHandle<Option<DisplayPanel>>,
}

impl SchedulerHandle {
    pub fn shutdown_flag(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Raise shutdown, wait for the loop to stop, then release the hardware.
    pub async fn shutdown(self, fan: Option<SharedFan>) -> Result<()> {
        self.shutdown.raise();
        info!("Waiting for background tasks to quit...");

        let display = self
            .task
            .await
            .map_err(|e| EnviroError::Background(e.to_string()))?;

        if let Some(fan) = fan {
            if let Err(e) = fan.lock().await.release() {
                warn!("Failed to release fan: {}", e);
            }
        }
        if let Some(mut display) = display {
            if let Err(e) = display.power_off() {
                warn!("Failed to turn off display backlight: {}", e);
            }
        }
        Ok(())
    }
}
