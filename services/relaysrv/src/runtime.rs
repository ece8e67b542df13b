//! Periodic tick tasks
//!
//! Two tokio intervals drive the engine: a 1 s tick for pulse expiry and
//! input refresh, and a `quantum_ms` tick for the sample ring. The engine
//! lock is never held across an `.await`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::RelayEngine;

/// Engine shared between the tick tasks and the signal loop
pub type SharedEngine = Arc<Mutex<RelayEngine>>;

pub fn shared(engine: RelayEngine) -> SharedEngine {
    Arc::new(Mutex::new(engine))
}

/// Handles of the spawned tick tasks
pub struct TickHandles {
    pub second: JoinHandle<()>,
    pub sample: JoinHandle<()>,
}

impl TickHandles {
    /// Wait for both tasks to finish (after the token is cancelled)
    pub async fn join(self) {
        if let Err(e) = self.second.await {
            warn!("Second tick task ended abnormally: {}", e);
        }
        if let Err(e) = self.sample.await {
            warn!("Sample tick task ended abnormally: {}", e);
        }
    }
}

/// Spawn both tick tasks on the current runtime
pub fn spawn_ticks(engine: SharedEngine, token: CancellationToken) -> TickHandles {
    let (clock, quantum_ms) = {
        let engine = engine.lock();
        (engine.clock(), engine.settings().sampling.quantum_ms.max(1))
    };

    let second = {
        let engine = Arc::clone(&engine);
        let clock = Arc::clone(&clock);
        let token = token.clone();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        engine.lock().on_second_tick(clock.now_secs());
                    }
                    _ = token.cancelled() => {
                        debug!("Second tick stopped");
                        break;
                    }
                }
            }
        })
    };

    let sample = tokio::spawn(async move {
        let mut ticker = interval(Duration::from_millis(quantum_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    engine.lock().on_sample_tick(clock.now_millis());
                }
                _ = token.cancelled() => {
                    debug!("Sample tick stopped");
                    break;
                }
            }
        }
    });

    TickHandles { second, sample }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::config::GpioTableConfig;
    use crate::engine::EngineSettings;
    use crate::points::PointSpec;
    use common::time::{ManualTimeProvider, TimeProvider};
    use relay_gpio::MockGpioDriver;

    #[tokio::test(start_paused = true)]
    async fn test_second_tick_ends_pulse() {
        let driver = MockGpioDriver::new();
        let gpio = driver.handle();
        let clock = Arc::new(ManualTimeProvider::new(1_000_000));
        let table = GpioTableConfig {
            chip: 0,
            points: vec![PointSpec::output("pump", 1, true)],
        };
        let mut engine = RelayEngine::new(
            Box::new(driver),
            Box::new(table.clone()),
            EngineSettings::default(),
        )
        .with_clock(clock.clone());
        engine.configure(&table).unwrap();
        engine.set(0, true, 2, Some("test"));
        assert_eq!(gpio.level(0, 1), Some(true));

        let engine = shared(engine);
        let token = CancellationToken::new();
        let ticks = spawn_ticks(Arc::clone(&engine), token.clone());

        clock.advance_secs(2);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(gpio.level(0, 1), Some(false));
        assert!(!engine.lock().point(0).unwrap().commanded());

        token.cancel();
        ticks.join().await;
        assert_eq!(clock.now_secs(), 1_002);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_tick_fills_ring_while_enabled() {
        let driver = MockGpioDriver::new();
        let gpio = driver.handle();
        let clock = Arc::new(ManualTimeProvider::new(5_000_000));
        let table = GpioTableConfig {
            chip: 0,
            points: vec![PointSpec::input("door", 4, true)],
        };
        let mut engine = RelayEngine::new(
            Box::new(driver),
            Box::new(table.clone()),
            EngineSettings::default(),
        )
        .with_clock(clock.clone());
        engine.configure(&table).unwrap();
        let first = engine.changes_since(0);
        assert_eq!(first.point("door").unwrap().samples.len(), 1);

        let engine = shared(engine);
        let token = CancellationToken::new();
        let ticks = spawn_ticks(Arc::clone(&engine), token.clone());

        for _ in 0..4 {
            clock.advance_millis(50);
            gpio.set_level(0, 4, !gpio.level(0, 4).unwrap());
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        token.cancel();
        ticks.join().await;

        let report = engine.lock().changes_since(first.start);
        assert!(!report.full);
        assert!(report.point("door").unwrap().samples.len() > 1);
    }
}
