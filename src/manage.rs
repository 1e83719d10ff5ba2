use chrono::NaiveDateTime;
use log::{error, info};

use crate::{
    api::BookingApi,
    error::ApiError,
    models::{Appointment, AppointmentStatus},
    validation::LookupForm,
};

pub const DEFAULT_CANCEL_REASON: &str = "Customer requested cancellation";

const LOOKUP_NOT_FOUND: &str = "Appointment not found. Please check your email and booking reference.";
const LOOKUP_FAILED: &str = "An error occurred while looking up your appointment. Please try again.";
const CANCELLED: &str = "Your appointment has been successfully cancelled.";
const CANCEL_NOT_FOUND: &str = "Appointment not found.";
const CANCEL_REJECTED: &str = "Cannot cancel this appointment. It may already be cancelled or completed.";
const CANCEL_FAILED: &str = "An error occurred while cancelling your appointment. Please try again.";

#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    Cancelled(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ManageState {
    Idle,
    Loading,
    Found {
        appointment: Appointment,
        outcome: Option<CancelOutcome>,
    },
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Success,
    Danger,
    Secondary,
    Warning,
    Info,
}

impl StatusColor {
    pub fn badge(&self) -> &'static str {
        match self {
            StatusColor::Success => "🟢",
            StatusColor::Danger => "🔴",
            StatusColor::Secondary => "⚪",
            StatusColor::Warning => "🟠",
            StatusColor::Info => "🔵",
        }
    }
}

pub fn status_color(status: AppointmentStatus) -> StatusColor {
    match status {
        AppointmentStatus::Confirmed | AppointmentStatus::Pending => StatusColor::Success,
        AppointmentStatus::Cancelled => StatusColor::Danger,
        AppointmentStatus::Completed => StatusColor::Secondary,
        AppointmentStatus::NoShow => StatusColor::Warning,
        AppointmentStatus::Unknown => StatusColor::Info,
    }
}

pub fn format_date_time(value: NaiveDateTime) -> String {
    value.format("%A, %B %-d, %Y at %-I:%M %p").to_string()
}

/// Lookup by email and booking reference, then optional cancellation.
#[derive(Debug, Clone)]
pub struct ManageScreen {
    pub lookup_form: LookupForm,
    pub cancel_reason: String,
    state: ManageState,
    cancel_dialog_open: bool,
    cancelling: bool,
}

impl Default for ManageScreen {
    fn default() -> Self {
        ManageScreen {
            lookup_form: LookupForm::default(),
            cancel_reason: String::new(),
            state: ManageState::Idle,
            cancel_dialog_open: false,
            cancelling: false,
        }
    }
}

impl ManageScreen {
    pub fn state(&self) -> &ManageState {
        &self.state
    }

    pub fn appointment(&self) -> Option<&Appointment> {
        match &self.state {
            ManageState::Found { appointment, .. } => Some(appointment),
            _ => None,
        }
    }

    pub fn is_cancel_dialog_open(&self) -> bool {
        self.cancel_dialog_open
    }

    pub fn is_loading(&self) -> bool {
        self.cancelling || self.state == ManageState::Loading
    }

    /// Returns whether a lookup was sent.
    pub async fn lookup_appointment<A: BookingApi + ?Sized>(&mut self, api: &A) -> bool {
        if !self.lookup_form.is_valid() {
            return false;
        }

        self.state = ManageState::Loading;
        let email = self.lookup_form.email.clone();
        let reference = self.lookup_form.booking_reference.clone();

        self.state = match api.lookup(&email, &reference).await {
            Ok(appointment) => ManageState::Found {
                appointment,
                outcome: None,
            },
            Err(e) => {
                error!("Error looking up appointment {reference}: {e}");
                ManageState::Error(lookup_error_message(&e))
            }
        };
        true
    }

    /// Only open appointments dated after `now` may be cancelled. The
    /// backend enforces the same rule.
    pub fn can_cancel_appointment(&self, now: NaiveDateTime) -> bool {
        match self.appointment() {
            Some(appointment) => appointment.status.is_open() && appointment.appointment_date_time > now,
            None => false,
        }
    }

    pub fn show_cancel_confirmation(&mut self) -> bool {
        let ManageState::Found { outcome, .. } = &mut self.state else {
            return false;
        };
        *outcome = None;
        self.cancel_dialog_open = true;
        true
    }

    pub fn close_cancel_dialog(&mut self) {
        self.cancel_dialog_open = false;
        self.cancel_reason.clear();
    }

    /// Returns whether a cancellation was sent.
    pub async fn cancel_appointment<A: BookingApi + ?Sized>(&mut self, api: &A) -> bool {
        let Some(reference) = self.appointment().map(|a| a.booking_reference.clone()) else {
            return false;
        };
        let reason = if self.cancel_reason.trim().is_empty() {
            DEFAULT_CANCEL_REASON.to_string()
        } else {
            self.cancel_reason.clone()
        };

        self.cancelling = true;
        let result = api
            .cancel(&self.lookup_form.email, &reference, Some(&reason))
            .await;
        self.cancelling = false;

        match result {
            Ok(cancelled) => {
                info!("appointment {reference} cancelled");
                self.state = ManageState::Found {
                    appointment: cancelled,
                    outcome: Some(CancelOutcome::Cancelled(CANCELLED.to_string())),
                };
                self.close_cancel_dialog();
            }
            Err(e) => {
                error!("Error cancelling appointment {reference}: {e}");
                if let ManageState::Found { outcome, .. } = &mut self.state {
                    *outcome = Some(CancelOutcome::Failed(cancel_error_message(&e)));
                }
            }
        }
        true
    }

    pub fn reset(&mut self) {
        *self = ManageScreen::default();
    }
}

pub fn lookup_error_message(err: &ApiError) -> String {
    match err.status() {
        Some(404) => LOOKUP_NOT_FOUND.to_string(),
        _ => LOOKUP_FAILED.to_string(),
    }
}

pub fn cancel_error_message(err: &ApiError) -> String {
    match err.status() {
        Some(404) => CANCEL_NOT_FOUND.to_string(),
        Some(400) => err
            .server_message()
            .unwrap_or(CANCEL_REJECTED)
            .to_string(),
        _ => CANCEL_FAILED.to_string(),
    }
}
