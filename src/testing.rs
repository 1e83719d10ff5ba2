//! In-memory `BookingApi` used by the screen tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::Semaphore;

use crate::{
    api::BookingApi,
    error::ApiError,
    models::{Appointment, AppointmentStatus, BookingRequest, Branch, Page, TimeSlot},
};

/// A scripted reply: the value, or a status with an optional server message.
pub type Reply<T> = Result<T, (u16, Option<&'static str>)>;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListBranches { page: usize, size: usize },
    SearchBranches { query: String, page: usize, size: usize },
    GetBranch(i64),
    Slots { branch_id: i64, date: NaiveDate },
    Book(BookingRequest),
    Lookup { email: String, reference: String },
    Cancel { email: String, reference: String, reason: Option<String> },
}

#[derive(Default)]
pub struct FakeApi {
    calls: Mutex<Vec<Call>>,
    pages: Mutex<VecDeque<Reply<Page<Branch>>>>,
    searches: Mutex<VecDeque<Reply<Page<Branch>>>>,
    branches: Mutex<VecDeque<Reply<Branch>>>,
    slots: Mutex<VecDeque<Reply<Vec<TimeSlot>>>>,
    appointments: Mutex<VecDeque<Reply<Appointment>>>,
    search_gate: Option<Arc<Semaphore>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, reply: Reply<Page<Branch>>) -> Self {
        self.pages.lock().unwrap().push_back(reply);
        self
    }

    pub fn with_search(self, reply: Reply<Page<Branch>>) -> Self {
        self.searches.lock().unwrap().push_back(reply);
        self
    }

    /// Searches take their reply when called, then wait for a permit on
    /// `gate` before returning it.
    pub fn with_search_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.search_gate = Some(gate);
        self
    }

    pub fn with_branch(self, reply: Reply<Branch>) -> Self {
        self.branches.lock().unwrap().push_back(reply);
        self
    }

    pub fn with_slots(self, reply: Reply<Vec<TimeSlot>>) -> Self {
        self.slots.lock().unwrap().push_back(reply);
        self
    }

    /// Replies for `book`, `lookup` and `cancel`, consumed in call order.
    pub fn with_appointment(self, reply: Reply<Appointment>) -> Self {
        self.appointments.lock().unwrap().push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> Option<Call> {
        self.calls.lock().unwrap().last().cloned()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn next<T>(queue: &Mutex<VecDeque<Reply<T>>>) -> Result<T, ApiError> {
    match queue.lock().unwrap().pop_front() {
        Some(Ok(value)) => Ok(value),
        Some(Err((status, message))) => Err(ApiError::Status {
            status,
            message: message.map(str::to_string),
        }),
        None => Err(ApiError::Status {
            status: 500,
            message: Some("no scripted reply".to_string()),
        }),
    }
}

#[async_trait]
impl BookingApi for FakeApi {
    async fn list_branches(&self, page: usize, size: usize) -> Result<Page<Branch>, ApiError> {
        self.record(Call::ListBranches { page, size });
        next(&self.pages)
    }

    async fn search_branches(
        &self,
        query: &str,
        page: usize,
        size: usize,
    ) -> Result<Page<Branch>, ApiError> {
        self.record(Call::SearchBranches {
            query: query.to_string(),
            page,
            size,
        });
        let reply = next(&self.searches);
        if let Some(gate) = &self.search_gate {
            gate.acquire().await.expect("search gate open").forget();
        }
        reply
    }

    async fn get_branch(&self, id: i64) -> Result<Branch, ApiError> {
        self.record(Call::GetBranch(id));
        next(&self.branches)
    }

    async fn available_slots(&self, branch_id: i64, date: NaiveDate) -> Result<Vec<TimeSlot>, ApiError> {
        self.record(Call::Slots { branch_id, date });
        next(&self.slots)
    }

    async fn book(&self, request: &BookingRequest) -> Result<Appointment, ApiError> {
        self.record(Call::Book(request.clone()));
        next(&self.appointments)
    }

    async fn lookup(&self, email: &str, booking_reference: &str) -> Result<Appointment, ApiError> {
        self.record(Call::Lookup {
            email: email.to_string(),
            reference: booking_reference.to_string(),
        });
        next(&self.appointments)
    }

    async fn cancel(
        &self,
        email: &str,
        booking_reference: &str,
        reason: Option<&str>,
    ) -> Result<Appointment, ApiError> {
        self.record(Call::Cancel {
            email: email.to_string(),
            reference: booking_reference.to_string(),
            reason: reason.map(str::to_string),
        });
        next(&self.appointments)
    }
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, minute, 0).unwrap()
}

pub fn branch(id: i64, name: &str) -> Branch {
    Branch {
        id,
        code: format!("JHB-{id:03}"),
        name: name.to_string(),
        address: format!("{id} Main Street, Johannesburg"),
        phone_number: "+27 11 123 4567".to_string(),
        opening_time: "08:00:00".to_string(),
        closing_time: "17:00:00".to_string(),
        max_concurrent_appointments_per_slot: 3,
    }
}

pub fn page(content: Vec<Branch>, total_pages: usize, total_elements: u64) -> Page<Branch> {
    Page {
        content,
        total_pages,
        total_elements,
    }
}

pub fn slot(start: NaiveDateTime, available: bool, current: u32, max: u32) -> TimeSlot {
    TimeSlot {
        start_time: start,
        end_time: start + chrono::Duration::minutes(30),
        available,
        current_bookings: current,
        max_bookings: max,
    }
}

pub fn appointment(status: AppointmentStatus, when: NaiveDateTime) -> Appointment {
    Appointment {
        id: Some(123),
        booking_reference: "BR20240115001".to_string(),
        branch_id: 1,
        customer_first_name: "John".to_string(),
        customer_last_name: "Doe".to_string(),
        customer_email: "john.doe@example.com".to_string(),
        customer_phone: "+27821234567".to_string(),
        appointment_date_time: when,
        duration_minutes: 30,
        purpose: Some("Consultation".to_string()),
        notes: None,
        status,
    }
}
