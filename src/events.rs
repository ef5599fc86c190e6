use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Events emitted by the transactional core for outbound dispatch
/// (notifications, analytics). Delivery mechanics live outside this crate;
/// the consumer here is a stand-in that logs what it drains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderPlaced(Uuid),
    OrderConfirmed(Uuid),
    OrderCancelled {
        order_id: Uuid,
        reason: Option<String>,
    },
    OrderRefunded(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Inventory events
    StockReserved {
        stock_record_id: Uuid,
        order_id: Uuid,
        quantity: i32,
    },
    ReservationReleased {
        reservation_id: Uuid,
        reason: String,
    },
    ReservationExpired(Uuid),
    StockMovementRecorded {
        stock_record_id: Uuid,
        movement_type: String,
        quantity: i32,
    },
    LowStock {
        stock_record_id: Uuid,
        available: i32,
    },
    TransferCompleted(Uuid),

    // Settlement events
    PaymentAuthorized(Uuid),
    PaymentCaptured {
        payment_id: Uuid,
        amount: Decimal,
    },
    PaymentRefunded {
        payment_id: Uuid,
        amount: Decimal,
    },
    EscrowReleased {
        payment_id: Uuid,
        vendor_id: Uuid,
        amount: Decimal,
        released_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates a connected sender/receiver pair with a bounded buffer.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Drains the event channel. In production deployments this is where the
/// outbound notification queue would be fed.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Event processor started");
    while let Some(event) = rx.recv().await {
        debug!(?event, "processing event");
    }
    info!("Event processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_round_trip_through_channel() {
        let (sender, mut rx) = channel(8);
        let order_id = Uuid::new_v4();
        sender.send(Event::OrderPlaced(order_id)).await.unwrap();

        match rx.recv().await {
            Some(Event::OrderPlaced(id)) => assert_eq!(id, order_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
