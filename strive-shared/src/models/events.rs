use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub class_id: Uuid,
    pub credits_used: i32,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub class_id: Uuid,
    pub refunded: bool,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct WaitlistPromotedEvent {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub class_id: Uuid,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PackagePurchasedEvent {
    pub grant_id: Uuid,
    pub user_id: Uuid,
    pub credits: i32,
    pub timestamp: i64,
}
