use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Every booking made through the bot occupies one fixed-length slot.
pub const BOOKING_DURATION_MINUTES: u32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub address: String,
    pub phone_number: String,
    pub opening_time: String,
    pub closing_time: String,
    pub max_concurrent_appointments_per_slot: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub available: bool,
    pub current_bookings: u32,
    pub max_bookings: u32,
}

impl TimeSlot {
    /// The list from the server may be stale by the time a slot is picked,
    /// so capacity is checked again here.
    pub fn is_selectable(&self) -> bool {
        self.available && self.current_bookings < self.max_bookings
    }

    pub fn remaining(&self) -> u32 {
        self.max_bookings.saturating_sub(self.current_bookings)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub branch_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub appointment_date_time: NaiveDateTime,
    pub duration_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
    #[serde(other)]
    Unknown,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "PENDING",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::NoShow => "NO_SHOW",
            AppointmentStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub booking_reference: String,
    pub branch_id: i64,
    pub customer_first_name: String,
    pub customer_last_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub appointment_date_time: NaiveDateTime,
    pub duration_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: AppointmentStatus,
}

/// One page of a paginated listing. Missing fields read as empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    #[serde(default)]
    pub total_pages: usize,
    #[serde(default)]
    pub total_elements: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiErrorResponse {
    pub status: Option<u16>,
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 12, 25)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn slot_needs_free_capacity_to_be_selectable() {
        let mut slot = TimeSlot {
            start_time: at(10, 0),
            end_time: at(10, 30),
            available: true,
            current_bookings: 2,
            max_bookings: 3,
        };
        assert!(slot.is_selectable());
        assert_eq!(slot.remaining(), 1);

        slot.current_bookings = 3;
        assert!(!slot.is_selectable());
        assert_eq!(slot.remaining(), 0);

        slot.current_bookings = 0;
        slot.available = false;
        assert!(!slot.is_selectable());
    }

    #[test]
    fn booking_request_omits_absent_optionals() {
        let request = BookingRequest {
            branch_id: 1,
            first_name: "John".into(),
            last_name: "Doe".into(),
            email: "john.doe@example.com".into(),
            phone_number: "+27821234567".into(),
            appointment_date_time: at(10, 0),
            duration_minutes: BOOKING_DURATION_MINUTES,
            purpose: None,
            notes: Some("Call first".into()),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["branchId"], 1);
        assert_eq!(json["appointmentDateTime"], "2024-12-25T10:00:00");
        assert_eq!(json["durationMinutes"], 30);
        assert!(json.get("purpose").is_none());
        assert_eq!(json["notes"], "Call first");
    }

    #[test]
    fn appointment_parses_backend_payload() {
        let body = r#"{
            "id": 123,
            "bookingReference": "BR20240115001",
            "branchId": 1,
            "customerFirstName": "John",
            "customerLastName": "Doe",
            "customerEmail": "john.doe@example.com",
            "customerPhone": "+27821234567",
            "appointmentDateTime": "2024-12-25T10:00:00",
            "durationMinutes": 30,
            "status": "NO_SHOW"
        }"#;
        let appointment: Appointment = serde_json::from_str(body).unwrap();
        assert_eq!(appointment.id, Some(123));
        assert_eq!(appointment.status, AppointmentStatus::NoShow);
        assert_eq!(appointment.appointment_date_time, at(10, 0));
        assert!(appointment.purpose.is_none());
    }

    #[test]
    fn unknown_status_is_tolerated() {
        let status: AppointmentStatus = serde_json::from_str("\"RESCHEDULED\"").unwrap();
        assert_eq!(status, AppointmentStatus::Unknown);
    }

    #[test]
    fn page_defaults_missing_fields() {
        let page: Page<Branch> = serde_json::from_str("{}").unwrap();
        assert!(page.content.is_empty());
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.total_elements, 0);
    }
}
