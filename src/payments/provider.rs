use crate::payments::error::PaymentResult;
use crate::payments::types::{StkPushAccepted, StkPushRequest};
use async_trait::async_trait;

/// Outbound side of a mobile-money gateway.
///
/// Implementations only start a payment; the outcome arrives later through
/// the gateway's callback and is never written from here.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate_stk_push(&self, request: StkPushRequest) -> PaymentResult<StkPushAccepted>;

    fn name(&self) -> &'static str;
}
