use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Outcome of a gateway call. The provider transaction id is stored on the
/// payment row for reconciliation.
#[derive(Debug, Clone)]
pub struct GatewayReceipt {
    pub provider_txn_id: String,
    pub amount: Decimal,
}

/// Payment gateway boundary. Authorization, capture and refund are black
/// boxes to the core; webhook-driven status updates are translated into
/// payment mutations by an adapter outside this crate.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(
        &self,
        payment_id: Uuid,
        amount: Decimal,
    ) -> Result<GatewayReceipt, ServiceError>;

    async fn capture(
        &self,
        payment_id: Uuid,
        amount: Decimal,
    ) -> Result<GatewayReceipt, ServiceError>;

    async fn refund(
        &self,
        payment_id: Uuid,
        amount: Decimal,
    ) -> Result<GatewayReceipt, ServiceError>;
}

/// Gateway stub that approves everything. Used by tests and local
/// development; never wired in production builds.
#[derive(Debug, Default, Clone)]
pub struct MockGateway;

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn authorize(
        &self,
        payment_id: Uuid,
        amount: Decimal,
    ) -> Result<GatewayReceipt, ServiceError> {
        Ok(GatewayReceipt {
            provider_txn_id: format!("auth-{}", payment_id),
            amount,
        })
    }

    async fn capture(
        &self,
        payment_id: Uuid,
        amount: Decimal,
    ) -> Result<GatewayReceipt, ServiceError> {
        Ok(GatewayReceipt {
            provider_txn_id: format!("cap-{}", payment_id),
            amount,
        })
    }

    async fn refund(
        &self,
        payment_id: Uuid,
        amount: Decimal,
    ) -> Result<GatewayReceipt, ServiceError> {
        Ok(GatewayReceipt {
            provider_txn_id: format!("ref-{}", payment_id),
            amount,
        })
    }
}
