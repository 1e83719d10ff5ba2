use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use teloxide::{
    types::{InlineKeyboardButton, InlineKeyboardMarkup},
    utils::html,
};

use crate::{
    booking::{format_time, BookingWizard, Step, PAGE_SIZE_OPTIONS},
    callbacks::Callback,
    manage::{format_date_time, status_color, CancelOutcome, ManageScreen, ManageState},
    models::{Appointment, Branch},
    search::highlight_match,
    validation::{Field, LookupField, LookupForm},
};

/// Telegram rejects messages longer than this, counted in UTF-16 units.
pub const MAX_MESSAGE_LEN: usize = 4096;
/// Telegram rejects inline keyboards with more buttons than this.
pub const MAX_BUTTONS: usize = 100;

// Room left under MAX_MESSAGE_LEN for the footer and error lines.
const LIST_TEXT_BUDGET: usize = 3600;
const MAX_LISTED_BRANCHES: usize = 48;
const MAX_TERM_SHOWN: usize = 64;

/// A rendered screen: HTML text plus its inline keyboard.
#[derive(Debug, Clone)]
pub struct View {
    pub text: String,
    pub markup: InlineKeyboardMarkup,
}

impl View {
    /// Text only, no buttons.
    pub fn notice(text: impl Into<String>) -> Self {
        View::new(text.into(), Vec::new())
    }

    pub fn has_buttons(&self) -> bool {
        !self.markup.inline_keyboard.is_empty()
    }

    fn new(text: String, rows: Vec<Vec<InlineKeyboardButton>>) -> Self {
        View {
            text,
            markup: InlineKeyboardMarkup::new(rows),
        }
    }
}

fn button(label: impl Into<String>, callback: Callback) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(label.into(), callback.data())
}

pub fn message_len(text: &str) -> usize {
    text.encode_utf16().count()
}

fn shorten(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let mut short: String = value.chars().take(max - 1).collect();
    short.push('…');
    short
}

fn header(step: Step) -> String {
    format!("<b>Step {} of 4 · {}</b>\n", step.number(), step.title())
}

fn push_error(text: &mut String, error: Option<&str>) {
    if let Some(error) = error {
        text.push_str(&format!("\n⚠️ {}\n", html::escape(error)));
    }
}

pub fn booking_view(wizard: &BookingWizard) -> View {
    match wizard.step() {
        Step::Branch => branch_step(wizard),
        Step::Slot => slot_step(wizard),
        Step::Details => details_step(wizard),
        Step::Confirmation => confirmation_step(wizard),
    }
}

fn branch_line(branch: &Branch, term: &str) -> String {
    format!(
        "• {} <i>({})</i>\n  {} · {}–{}\n",
        highlight_match(&branch.name, term),
        html::escape(&branch.code),
        html::escape(&branch.address),
        html::escape(short_time(&branch.opening_time)),
        html::escape(short_time(&branch.closing_time)),
    )
}

/// "08:00:00" -> "08:00"
fn short_time(value: &str) -> &str {
    match value.match_indices(':').nth(1) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

fn branch_step(wizard: &BookingWizard) -> View {
    let mut text = header(Step::Branch);
    let mut rows = Vec::new();
    let pager = wizard.pager();

    if wizard.is_searching() {
        text.push_str(&format!(
            "🔍 Results for “{}”{}\n",
            html::escape(&shorten(wizard.search_term(), MAX_TERM_SHOWN)),
            if wizard.search_loading() { " (searching…)" } else { "" }
        ));
    } else if pager.total_elements > 0 {
        text.push_str(&format!(
            "Page {} of {} · {} branches\n",
            pager.page + 1,
            pager.total_pages.max(1),
            pager.total_elements
        ));
    }
    push_error(&mut text, wizard.error());
    text.push('\n');

    let term = if wizard.is_searching() { wizard.search_term() } else { "" };
    let branches = wizard.filtered_branches();
    if branches.is_empty() {
        text.push_str("No branches found.\n");
    }
    let mut listed = 0;
    for branch in branches.iter().take(MAX_LISTED_BRANCHES) {
        let line = branch_line(branch, term);
        if message_len(&text) + message_len(&line) > LIST_TEXT_BUDGET {
            break;
        }
        text.push_str(&line);
        rows.push(vec![button(branch.name.clone(), Callback::Branch(branch.id))]);
        listed += 1;
    }
    if listed < branches.len() {
        text.push_str(&format!(
            "\nShowing {listed} of {}. {}\n",
            branches.len(),
            if wizard.is_searching() {
                "Refine the search to see the rest."
            } else {
                "Pick a smaller page size to see the rest."
            }
        ));
    }

    if wizard.is_searching() {
        rows.push(vec![button("✖ Clear search", Callback::ClearSearch)]);
    } else {
        if pager.total_pages > 1 {
            rows.extend(page_rows(wizard));
        }
        rows.push(
            PAGE_SIZE_OPTIONS
                .iter()
                .map(|&size| {
                    let label = if size == pager.size { format!("✓ {size}") } else { size.to_string() };
                    button(label, Callback::PageSize(size))
                })
                .collect(),
        );
        rows.push(vec![button("🔍 Search", Callback::Search)]);
    }

    View::new(text, rows)
}

/// Visible page numbers on one row, arrows on the next. Hidden pages are
/// left out so the row stays inside Telegram's width limit.
fn page_rows(wizard: &BookingWizard) -> Vec<Vec<InlineKeyboardButton>> {
    let pager = wizard.pager();
    let numbers = pager
        .page_numbers()
        .into_iter()
        .filter(|&index| wizard.should_show_page_number(index))
        .map(|index| {
            let label = if index == pager.page {
                format!("·{}·", index + 1)
            } else {
                (index + 1).to_string()
            };
            button(label, Callback::Page(index))
        })
        .collect();

    let mut arrows = Vec::new();
    if pager.has_previous() {
        arrows.push(button("‹ Prev", Callback::PreviousPage));
    }
    if pager.has_next() {
        arrows.push(button("Next ›", Callback::NextPage));
    }
    vec![numbers, arrows]
}

fn slot_step(wizard: &BookingWizard) -> View {
    let mut text = header(Step::Slot);
    if let Some(branch) = wizard.selected_branch() {
        text.push_str(&format!("Branch: <b>{}</b>\n", html::escape(&branch.name)));
    }
    if let Some(date) = wizard.form.date {
        text.push_str(&format!("Date: <b>{}</b>\n", date.format("%A, %B %-d, %Y")));
    }
    push_error(&mut text, wizard.error());

    let mut rows = calendar_rows(wizard.min_date(), wizard.max_date(), wizard.form.date);

    if wizard.available_slots().is_empty() {
        text.push_str("\nNo time slots available on this date.\n");
    } else {
        text.push_str("\nPick a time:\n");
    }
    let mut row = Vec::new();
    for slot in wizard.available_slots() {
        let time = format_time(slot.start_time);
        let label = if wizard.is_slot_selected(slot) {
            format!("✅ {time}")
        } else if slot.is_selectable() {
            format!("{time} ({} left)", slot.remaining())
        } else {
            format!("❌ {time}")
        };
        row.push(button(label, Callback::Slot(slot.start_time)));
        if row.len() == 2 {
            rows.push(std::mem::take(&mut row));
        }
    }
    if !row.is_empty() {
        rows.push(row);
    }

    let mut nav = vec![button("⟵ Back", Callback::Back)];
    if wizard.can_proceed_to_details() {
        nav.push(button("Continue ➡️", Callback::Next));
    }
    rows.push(nav);
    View::new(text, rows)
}

/// Week rows covering `[min, max]`, Monday first. Days outside the window
/// are inert.
pub fn calendar_rows(
    min: NaiveDate,
    max: NaiveDate,
    selected: Option<NaiveDate>,
) -> Vec<Vec<InlineKeyboardButton>> {
    let mut rows = vec![["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"]
        .into_iter()
        .map(|d| button(d, Callback::Ignore))
        .collect::<Vec<_>>()];

    let mut day = min - Duration::days(min.weekday().num_days_from_monday() as i64);
    while day <= max {
        let mut week = Vec::with_capacity(7);
        for _ in 0..7 {
            if day < min || day > max {
                week.push(button(" ", Callback::Ignore));
            } else {
                let mut label = if day.day() == 1 || day == min {
                    format!("{} {}", day.day(), day.format("%b"))
                } else {
                    day.day().to_string()
                };
                if Some(day) == selected {
                    label = format!("[{label}]");
                }
                week.push(button(label, Callback::Date(day)));
            }
            day += Duration::days(1);
        }
        rows.push(week);
    }
    rows
}

fn details_step(wizard: &BookingWizard) -> View {
    let mut text = header(Step::Details);
    if let (Some(branch), Some(slot)) = (wizard.selected_branch(), wizard.selected_slot()) {
        text.push_str(&format!(
            "{} · {}\n\n",
            html::escape(&branch.name),
            format_date_time(slot.start_time)
        ));
    }
    for field in Field::DETAILS {
        let value = wizard.form.value(field);
        let shown = if value.is_empty() { "—".to_string() } else { html::escape(&value) };
        text.push_str(&format!("{}: {}", field.label(), shown));
        if let Some(error) = wizard.form.visible_error(field) {
            text.push_str(&format!("  ⚠️ {error}"));
        }
        text.push('\n');
    }
    push_error(&mut text, wizard.error());

    let mut rows = Vec::new();
    if wizard.form.is_valid() {
        rows.push(vec![button("✅ Confirm booking", Callback::Submit)]);
    }
    rows.push(vec![button("⟵ Back", Callback::Back)]);
    View::new(text, rows)
}

pub fn field_prompt(wizard: &BookingWizard, field: Field) -> View {
    let mut text = String::new();
    if let Some(error) = wizard.form.visible_error(field) {
        text.push_str(&format!("⚠️ {error}\n"));
    }
    text.push_str(&format!("Enter your <b>{}</b>", field.label().to_lowercase()));
    let mut rows = Vec::new();
    if field.is_optional() {
        text.push_str(" (optional)");
        rows.push(vec![button("Skip", Callback::SkipField)]);
    }
    text.push(':');
    View::new(text, rows)
}

fn appointment_card(appointment: &Appointment) -> String {
    let color = status_color(appointment.status);
    let mut text = format!(
        "Reference: <code>{}</code>\nStatus: {} {}\nWhen: {}\nDuration: {} minutes\nName: {} {}\nEmail: {}\nPhone: {}\n",
        html::escape(&appointment.booking_reference),
        color.badge(),
        appointment.status.as_str(),
        format_date_time(appointment.appointment_date_time),
        appointment.duration_minutes,
        html::escape(&appointment.customer_first_name),
        html::escape(&appointment.customer_last_name),
        html::escape(&appointment.customer_email),
        html::escape(&appointment.customer_phone),
    );
    if let Some(purpose) = &appointment.purpose {
        text.push_str(&format!("Purpose: {}\n", html::escape(purpose)));
    }
    if let Some(notes) = &appointment.notes {
        text.push_str(&format!("Notes: {}\n", html::escape(notes)));
    }
    text
}

fn confirmation_step(wizard: &BookingWizard) -> View {
    let mut text = header(Step::Confirmation);
    if let Some(branch) = wizard.selected_branch() {
        text.push_str(&format!("Branch: <b>{}</b>\n", html::escape(&branch.name)));
    }
    if let Some(appointment) = wizard.confirmed_appointment() {
        text.push_str(&appointment_card(appointment));
        text.push_str("\nKeep your booking reference: use /manage with your email to look it up or cancel.");
    }
    View::new(text, vec![vec![button("Book another appointment", Callback::NewBooking)]])
}

pub fn lookup_prompt(form: &LookupForm, field: LookupField) -> View {
    let mut text = String::new();
    if let Some(error) = form.visible_error(field) {
        text.push_str(&format!("⚠️ {error}\n"));
    }
    text.push_str(match field {
        LookupField::Email => "Enter the <b>email</b> you booked with:",
        LookupField::BookingReference => "Enter your <b>booking reference</b>:",
    });
    View::new(text, Vec::new())
}

pub fn manage_view(screen: &ManageScreen, now: NaiveDateTime) -> View {
    match screen.state() {
        ManageState::Idle => lookup_prompt(&screen.lookup_form, LookupField::Email),
        ManageState::Loading => View::new("Looking up your appointment…".to_string(), Vec::new()),
        ManageState::Error(message) => View::new(
            format!("⚠️ {}", html::escape(message)),
            vec![vec![button("Try again", Callback::ManageReset)]],
        ),
        ManageState::Found { appointment, outcome } => {
            let mut text = String::from("<b>Your appointment</b>\n");
            text.push_str(&appointment_card(appointment));
            match outcome {
                Some(CancelOutcome::Cancelled(message)) => {
                    text.push_str(&format!("\n✅ {}\n", html::escape(message)))
                }
                Some(CancelOutcome::Failed(message)) => {
                    text.push_str(&format!("\n⚠️ {}\n", html::escape(message)))
                }
                None => {}
            }

            let mut rows = Vec::new();
            if screen.is_cancel_dialog_open() {
                text.push_str("\nCancel this appointment? Send a reason as a message if you like.\n");
                if !screen.cancel_reason.trim().is_empty() {
                    text.push_str(&format!("Reason: {}\n", html::escape(&screen.cancel_reason)));
                }
                rows.push(vec![
                    button("Yes, cancel it", Callback::ManageConfirm),
                    button("Keep appointment", Callback::ManageClose),
                ]);
            } else {
                if screen.can_cancel_appointment(now) {
                    rows.push(vec![button("❌ Cancel appointment", Callback::ManageCancel)]);
                }
                rows.push(vec![button("Look up another", Callback::ManageReset)]);
            }
            View::new(text, rows)
        }
    }
}
