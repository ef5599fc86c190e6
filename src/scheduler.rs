//! Background sweeps.
//!
//! The reservation-expiry and escrow-release sweeps run on independent
//! timers. All claiming happens inside the services via conditional
//! updates, so any number of scheduler instances can run against the same
//! database without double-processing a row.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::services::reservations::ReservationService;
use crate::services::settlement::SettlementService;

pub struct Scheduler {
    reservations: ReservationService,
    settlement: SettlementService,
    reservation_interval: Duration,
    escrow_interval: Duration,
}

impl Scheduler {
    pub fn new(
        cfg: &AppConfig,
        reservations: ReservationService,
        settlement: SettlementService,
    ) -> Self {
        Self {
            reservations,
            settlement,
            reservation_interval: Duration::from_secs(cfg.reservation_sweep_interval_secs),
            escrow_interval: Duration::from_secs(cfg.escrow_sweep_interval_secs),
        }
    }

    /// Spawns both sweep loops. A failed tick is logged and the loop goes
    /// on; the next tick picks the work up again.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let Self {
            reservations,
            settlement,
            reservation_interval,
            escrow_interval,
        } = self;

        info!(
            reservation_interval_secs = reservation_interval.as_secs(),
            escrow_interval_secs = escrow_interval.as_secs(),
            "Scheduler started"
        );

        let reservation_loop = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(reservation_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match reservations.sweep_expired().await {
                    Ok(result) if result.expired_count > 0 => {
                        info!(
                            expired = result.expired_count,
                            skipped = result.skipped_count,
                            "Reservation sweep tick"
                        );
                    }
                    Ok(_) => {}
                    Err(err) => error!(error = %err, "Reservation sweep failed"),
                }
            }
        });

        let escrow_loop = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(escrow_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match settlement.sweep_escrow().await {
                    Ok(result) if result.released_count > 0 => {
                        info!(
                            released = result.released_count,
                            total = %result.released_total,
                            "Escrow sweep tick"
                        );
                    }
                    Ok(_) => {}
                    Err(err) => error!(error = %err, "Escrow sweep failed"),
                }
            }
        });

        vec![reservation_loop, escrow_loop]
    }
}
