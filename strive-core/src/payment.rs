use async_trait::async_trait;
use uuid::Uuid;

/// External payment collaborator. The engine only cares whether the charge
/// went through; declined charges are a normal outcome, not an error.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(
        &self,
        user_id: Uuid,
        credits: i32,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

/// Simulated gateway. Approves everything unless a decline threshold is set,
/// which gives tests a deterministic failure trigger.
pub struct MockPaymentGateway {
    decline_above: Option<i32>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self {
            decline_above: None,
        }
    }

    pub fn declining_above(credits: i32) -> Self {
        Self {
            decline_above: Some(credits),
        }
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn charge(
        &self,
        user_id: Uuid,
        credits: i32,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        if let Some(limit) = self.decline_above {
            if credits > limit {
                tracing::warn!("Payment declined for user {}: {} credits", user_id, credits);
                return Ok(false);
            }
        }
        tracing::info!("Payment charged for user {}: {} credits", user_id, credits);
        Ok(true)
    }
}
