//! Booking record

use serde::{Deserialize, Serialize};

/// Booking lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            _ => Err(format!("Unknown booking status: {}", s)),
        }
    }
}

/// An appointment request captured from a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    /// Assigned by the store on insert (0 until then)
    pub id: i64,
    pub business_id: String,
    pub customer_phone: String,
    pub customer_name: Option<String>,
    pub service: String,
    /// Raw scheduling text as the customer phrased it ("Friday at 2pm")
    pub scheduled_for: String,
    pub duration_minutes: i64,
    pub status: BookingStatus,
    pub notes: String,
    pub created_at: i64,
}

impl Booking {
    pub fn new(
        business_id: impl Into<String>,
        customer_phone: impl Into<String>,
        service: impl Into<String>,
        scheduled_for: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            business_id: business_id.into(),
            customer_phone: customer_phone.into(),
            customer_name: None,
            service: service.into(),
            scheduled_for: scheduled_for.into(),
            duration_minutes: 60,
            status: BookingStatus::Pending,
            notes: String::new(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_defaults() {
        let booking = Booking::new("b1", "+15551234567", "haircut", "friday 2pm");

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.duration_minutes, 60);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            BookingStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
    }
}
