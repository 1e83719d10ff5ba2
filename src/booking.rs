use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::{debug, error, info};

use crate::{
    api::BookingApi,
    error::ApiError,
    models::{Appointment, Branch, BookingRequest, Page, TimeSlot, BOOKING_DURATION_MINUTES},
    validation::{BookingForm, Field},
};

pub const PAGE_SIZE_OPTIONS: [usize; 4] = [6, 12, 24, 48];
pub const DEFAULT_PAGE_SIZE: usize = 6;
pub const SEARCH_PAGE_SIZE: usize = 100;
pub const BOOKING_WINDOW_DAYS: i64 = 30;

const LOAD_BRANCHES_FAILED: &str = "Failed to load branches. Please try again.";
const SEARCH_FAILED: &str = "Failed to search branches. Please try again.";
const LOAD_SLOTS_FAILED: &str = "Failed to load available time slots. Please try again.";
const BOOKING_INVALID: &str = "Invalid booking information. Please check your details and try again.";
const BRANCH_NOT_FOUND: &str = "Branch not found. Please select a different branch.";
const BOOKING_FAILED: &str = "Failed to book appointment. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Branch = 1,
    Slot = 2,
    Details = 3,
    Confirmation = 4,
}

impl Step {
    pub fn number(self) -> u8 {
        self as u8
    }

    fn next(self) -> Option<Step> {
        match self {
            Step::Branch => Some(Step::Slot),
            Step::Slot => Some(Step::Details),
            Step::Details => Some(Step::Confirmation),
            Step::Confirmation => None,
        }
    }

    fn previous(self) -> Option<Step> {
        match self {
            Step::Branch => None,
            Step::Slot => Some(Step::Branch),
            Step::Details => Some(Step::Slot),
            Step::Confirmation => Some(Step::Details),
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::Branch => "Choose a branch",
            Step::Slot => "Pick a date and time",
            Step::Details => "Your details",
            Step::Confirmation => "Booking confirmed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub page: usize,
    pub size: usize,
    pub total_pages: usize,
    pub total_elements: u64,
}

impl Default for Pager {
    fn default() -> Self {
        Pager {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            total_pages: 0,
            total_elements: 0,
        }
    }
}

impl Pager {
    pub fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 0
    }

    pub fn page_numbers(&self) -> Vec<usize> {
        (0..self.total_pages).collect()
    }

    /// First and last pages are always shown, plus anything within two of
    /// the current page.
    pub fn should_show_page_number(&self, index: usize) -> bool {
        if index == 0 || index + 1 == self.total_pages {
            return true;
        }
        index.abs_diff(self.page) <= 2
    }
}

/// Identifies one dispatched search. Only the latest ticket may apply its
/// result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    pub generation: u64,
    pub query: String,
}

/// The four-step booking flow: branch, slot, details, confirmation.
#[derive(Debug, Clone)]
pub struct BookingWizard {
    step: Step,
    branches: Vec<Branch>,
    filtered_branches: Vec<Branch>,
    search_term: String,
    is_searching: bool,
    search_loading: bool,
    search_generation: u64,
    pager: Pager,
    selected_branch: Option<Branch>,
    available_slots: Vec<TimeSlot>,
    selected_slot: Option<TimeSlot>,
    pub form: BookingForm,
    today: NaiveDate,
    loading: bool,
    error: Option<String>,
    confirmed_appointment: Option<Appointment>,
}

impl BookingWizard {
    pub fn new(today: NaiveDate) -> Self {
        BookingWizard {
            step: Step::Branch,
            branches: Vec::new(),
            filtered_branches: Vec::new(),
            search_term: String::new(),
            is_searching: false,
            search_loading: false,
            search_generation: 0,
            pager: Pager::default(),
            selected_branch: None,
            available_slots: Vec::new(),
            selected_slot: None,
            form: BookingForm::new(today),
            today,
            loading: false,
            error: None,
            confirmed_appointment: None,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn filtered_branches(&self) -> &[Branch] {
        &self.filtered_branches
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn is_searching(&self) -> bool {
        self.is_searching
    }

    pub fn search_loading(&self) -> bool {
        self.search_loading
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn selected_branch(&self) -> Option<&Branch> {
        self.selected_branch.as_ref()
    }

    pub fn available_slots(&self) -> &[TimeSlot] {
        &self.available_slots
    }

    pub fn selected_slot(&self) -> Option<&TimeSlot> {
        self.selected_slot.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn confirmed_appointment(&self) -> Option<&Appointment> {
        self.confirmed_appointment.as_ref()
    }

    pub fn min_date(&self) -> NaiveDate {
        self.today
    }

    pub fn max_date(&self) -> NaiveDate {
        self.today + Duration::days(BOOKING_WINDOW_DAYS)
    }

    pub fn date_in_window(&self, date: NaiveDate) -> bool {
        date >= self.min_date() && date <= self.max_date()
    }

    pub fn next_step(&mut self) {
        if let Some(next) = self.step.next() {
            self.step = next;
        }
    }

    pub fn previous_step(&mut self) {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
            // never leave a confirmation on screen while the user edits
            self.confirmed_appointment = None;
        }
    }

    pub async fn load_branches<A: BookingApi + ?Sized>(&mut self, api: &A) {
        self.loading = true;
        self.error = None;

        match api.list_branches(self.pager.page, self.pager.size).await {
            Ok(Page {
                content,
                total_pages,
                total_elements,
            }) => {
                self.branches = content;
                self.filtered_branches = self.branches.clone();
                self.pager.total_pages = total_pages;
                self.pager.total_elements = total_elements;
            }
            Err(e) => {
                error!("Error loading branches: {e}");
                self.error = Some(LOAD_BRANCHES_FAILED.to_string());
            }
        }
        self.loading = false;
    }

    /// Returns whether a fetch was issued.
    pub async fn go_to_page<A: BookingApi + ?Sized>(&mut self, api: &A, page: usize) -> bool {
        if page >= self.pager.total_pages {
            return false;
        }
        self.pager.page = page;
        self.load_branches(api).await;
        true
    }

    pub async fn next_page<A: BookingApi + ?Sized>(&mut self, api: &A) -> bool {
        if !self.pager.has_next() {
            return false;
        }
        self.pager.page += 1;
        self.load_branches(api).await;
        true
    }

    pub async fn previous_page<A: BookingApi + ?Sized>(&mut self, api: &A) -> bool {
        if !self.pager.has_previous() {
            return false;
        }
        self.pager.page -= 1;
        self.load_branches(api).await;
        true
    }

    pub async fn change_page_size<A: BookingApi + ?Sized>(&mut self, api: &A, size: usize) -> bool {
        if !PAGE_SIZE_OPTIONS.contains(&size) {
            return false;
        }
        self.pager.size = size;
        self.pager.page = 0;
        self.load_branches(api).await;
        true
    }

    pub fn should_show_page_number(&self, index: usize) -> bool {
        self.pager.should_show_page_number(index)
    }

    /// Takes a settled search value. A blank value clears the search;
    /// anything else starts a new search generation and returns the ticket
    /// the caller must present with the result.
    pub fn apply_search_input(&mut self, value: &str) -> Option<SearchTicket> {
        if value.trim().is_empty() {
            self.clear_search();
            return None;
        }

        self.search_term = value.to_string();
        self.search_loading = true;
        self.is_searching = true;
        self.error = None;
        self.search_generation += 1;
        Some(SearchTicket {
            generation: self.search_generation,
            query: value.to_string(),
        })
    }

    /// Applies a search response. Returns false when the ticket is stale and
    /// the response was discarded.
    pub fn finish_search(&mut self, ticket: &SearchTicket, result: Result<Page<Branch>, ApiError>) -> bool {
        if !self.is_searching || ticket.generation != self.search_generation {
            debug!(
                "dropping stale search {:?} (generation {}, latest {})",
                ticket.query, ticket.generation, self.search_generation
            );
            return false;
        }

        match result {
            Ok(page) => self.filtered_branches = page.content,
            Err(e) => {
                error!("Error searching branches: {e}");
                self.error = Some(SEARCH_FAILED.to_string());
            }
        }
        self.search_loading = false;
        true
    }

    pub async fn search<A: BookingApi + ?Sized>(&mut self, api: &A, value: &str) {
        let Some(ticket) = self.apply_search_input(value) else {
            return;
        };
        let result = api.search_branches(&ticket.query, 0, SEARCH_PAGE_SIZE).await;
        self.finish_search(&ticket, result);
    }

    pub fn clear_search(&mut self) {
        self.search_term.clear();
        self.is_searching = false;
        self.search_loading = false;
        self.search_generation += 1;
        self.filtered_branches = self.branches.clone();
    }

    pub async fn select_branch<A: BookingApi + ?Sized>(&mut self, api: &A, branch: Branch) {
        info!("branch {} ({}) selected", branch.id, branch.code);
        self.selected_branch = Some(branch);
        self.next_step();
        self.load_available_slots(api).await;
    }

    /// Picks a branch by id from what is on screen, asking the backend
    /// when the list no longer has it.
    pub async fn select_branch_by_id<A: BookingApi + ?Sized>(&mut self, api: &A, id: i64) -> bool {
        let known = self
            .filtered_branches
            .iter()
            .chain(self.branches.iter())
            .find(|b| b.id == id)
            .cloned();

        let branch = match known {
            Some(branch) => branch,
            None => match api.get_branch(id).await {
                Ok(branch) => branch,
                Err(e) => {
                    error!("Error loading branch {id}: {e}");
                    self.error = Some(match e.status() {
                        Some(404) => BRANCH_NOT_FOUND.to_string(),
                        _ => LOAD_BRANCHES_FAILED.to_string(),
                    });
                    return false;
                }
            },
        };
        self.select_branch(api, branch).await;
        true
    }

    pub async fn change_date<A: BookingApi + ?Sized>(&mut self, api: &A, date: NaiveDate) {
        self.form.date = Some(date);
        if self.selected_branch.is_some() {
            self.load_available_slots(api).await;
        }
    }

    pub async fn load_available_slots<A: BookingApi + ?Sized>(&mut self, api: &A) {
        let (Some(branch_id), Some(date)) = (self.selected_branch.as_ref().map(|b| b.id), self.form.date) else {
            return;
        };

        self.loading = true;
        self.error = None;
        self.selected_slot = None;

        match api.available_slots(branch_id, date).await {
            Ok(slots) => self.available_slots = slots,
            Err(e) => {
                error!("Error loading slots for branch {branch_id} on {date}: {e}");
                self.error = Some(LOAD_SLOTS_FAILED.to_string());
            }
        }
        self.loading = false;
    }

    /// Returns whether the slot was taken.
    pub fn select_time_slot(&mut self, slot: &TimeSlot) -> bool {
        if !slot.is_selectable() {
            return false;
        }
        self.selected_slot = Some(slot.clone());
        true
    }

    pub fn is_slot_selected(&self, slot: &TimeSlot) -> bool {
        self.selected_slot
            .as_ref()
            .is_some_and(|s| s.start_time == slot.start_time)
    }

    pub fn can_proceed_to_details(&self) -> bool {
        self.selected_slot.is_some() && self.form.is_field_valid(Field::Date)
    }

    pub fn booking_request(&self) -> Option<BookingRequest> {
        let branch = self.selected_branch.as_ref()?;
        let slot = self.selected_slot.as_ref()?;
        Some(BookingRequest {
            branch_id: branch.id,
            first_name: self.form.first_name.clone(),
            last_name: self.form.last_name.clone(),
            email: self.form.email.clone(),
            phone_number: self.form.phone_number.clone(),
            appointment_date_time: slot.start_time,
            duration_minutes: BOOKING_DURATION_MINUTES,
            purpose: non_blank(&self.form.purpose),
            notes: non_blank(&self.form.notes),
        })
    }

    /// Returns whether a booking was sent.
    pub async fn submit_booking<A: BookingApi + ?Sized>(&mut self, api: &A) -> bool {
        if !self.form.is_valid() {
            return false;
        }
        let Some(request) = self.booking_request() else {
            return false;
        };

        self.loading = true;
        self.error = None;

        match api.book(&request).await {
            Ok(appointment) => {
                info!(
                    "booked {} at branch {} for {}",
                    appointment.booking_reference, request.branch_id, request.appointment_date_time
                );
                self.confirmed_appointment = Some(appointment);
                self.loading = false;
                self.next_step();
            }
            Err(e) => {
                error!("Error booking appointment: {e}");
                self.loading = false;
                self.error = Some(booking_error_message(&e));
            }
        }
        true
    }

    pub fn start_new_booking(&mut self, today: NaiveDate) {
        self.today = today;
        self.step = Step::Branch;
        self.selected_branch = None;
        self.selected_slot = None;
        self.available_slots.clear();
        self.confirmed_appointment = None;
        self.form.reset(today);
        self.error = None;
    }
}

fn non_blank(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Server message first, then a status-specific message, then the generic one.
pub fn booking_error_message(err: &ApiError) -> String {
    if let Some(message) = err.server_message() {
        return message.to_string();
    }
    match err.status() {
        Some(400) => BOOKING_INVALID.to_string(),
        Some(404) => BRANCH_NOT_FOUND.to_string(),
        _ => BOOKING_FAILED.to_string(),
    }
}

pub fn format_time(time: NaiveDateTime) -> String {
    time.format("%-I:%M %p").to_string()
}
