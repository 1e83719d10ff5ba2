use std::collections::HashSet;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

// Same shape the browser form validator accepts. The regex crate has no
// lookaheads, so length limits are checked separately.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-zA-Z0-9!#$%&'*+/=?^_`{|}~-]+)*@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern compiles")
});

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+]?[0-9\-\s()]+$").expect("phone pattern compiles"));

const EMAIL_MAX_TOTAL: usize = 254;
const EMAIL_MAX_LOCAL: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("This field is required.")]
    Required,
    #[error("Must be at most {max} characters.")]
    TooLong { max: usize },
    #[error("Please enter a valid email address.")]
    InvalidEmail,
    #[error("Please enter a valid phone number.")]
    InvalidPhone,
}

pub fn is_email(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    let Some((local, _)) = value.split_once('@') else {
        return false;
    };
    value.len() <= EMAIL_MAX_TOTAL && local.len() <= EMAIL_MAX_LOCAL && EMAIL_RE.is_match(value)
}

pub fn is_phone(value: &str) -> bool {
    value.is_empty() || PHONE_RE.is_match(value)
}

fn required(value: &str, errors: &mut Vec<FieldError>) {
    if value.is_empty() {
        errors.push(FieldError::Required);
    }
}

fn max_len(value: &str, max: usize, errors: &mut Vec<FieldError>) {
    if value.chars().count() > max {
        errors.push(FieldError::TooLong { max });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Date,
    FirstName,
    LastName,
    Email,
    PhoneNumber,
    Purpose,
    Notes,
}

impl Field {
    /// Order in which the details step asks for typed input.
    pub const DETAILS: [Field; 6] = [
        Field::FirstName,
        Field::LastName,
        Field::Email,
        Field::PhoneNumber,
        Field::Purpose,
        Field::Notes,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Field::Date => "Date",
            Field::FirstName => "First name",
            Field::LastName => "Last name",
            Field::Email => "Email",
            Field::PhoneNumber => "Phone number",
            Field::Purpose => "Purpose of visit",
            Field::Notes => "Additional notes",
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Field::Purpose | Field::Notes)
    }

    pub fn next_detail(&self) -> Option<Field> {
        let idx = Field::DETAILS.iter().position(|f| f == self)?;
        Field::DETAILS.get(idx + 1).copied()
    }
}

/// Customer details plus the chosen date.
#[derive(Debug, Clone)]
pub struct BookingForm {
    pub date: Option<NaiveDate>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub purpose: String,
    pub notes: String,
    touched: HashSet<Field>,
}

impl BookingForm {
    pub fn new(today: NaiveDate) -> Self {
        BookingForm {
            date: Some(today),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone_number: String::new(),
            purpose: String::new(),
            notes: String::new(),
            touched: HashSet::new(),
        }
    }

    pub fn reset(&mut self, today: NaiveDate) {
        *self = BookingForm::new(today);
    }

    pub fn value(&self, field: Field) -> String {
        match field {
            Field::Date => self.date.map(|d| d.to_string()).unwrap_or_default(),
            Field::FirstName => self.first_name.clone(),
            Field::LastName => self.last_name.clone(),
            Field::Email => self.email.clone(),
            Field::PhoneNumber => self.phone_number.clone(),
            Field::Purpose => self.purpose.clone(),
            Field::Notes => self.notes.clone(),
        }
    }

    /// Dates are read as `YYYY-MM-DD`; anything else leaves the date empty.
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        match field {
            Field::Date => self.date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok(),
            Field::FirstName => self.first_name = value,
            Field::LastName => self.last_name = value,
            Field::Email => self.email = value,
            Field::PhoneNumber => self.phone_number = value,
            Field::Purpose => self.purpose = value,
            Field::Notes => self.notes = value,
        }
    }

    pub fn mark_touched(&mut self, field: Field) {
        self.touched.insert(field);
    }

    pub fn is_touched(&self, field: Field) -> bool {
        self.touched.contains(&field)
    }

    pub fn errors(&self, field: Field) -> Vec<FieldError> {
        let mut errors = Vec::new();
        match field {
            Field::Date => {
                if self.date.is_none() {
                    errors.push(FieldError::Required);
                }
            }
            Field::FirstName => {
                required(&self.first_name, &mut errors);
                max_len(&self.first_name, 100, &mut errors);
            }
            Field::LastName => {
                required(&self.last_name, &mut errors);
                max_len(&self.last_name, 100, &mut errors);
            }
            Field::Email => {
                required(&self.email, &mut errors);
                if !is_email(&self.email) {
                    errors.push(FieldError::InvalidEmail);
                }
                max_len(&self.email, 255, &mut errors);
            }
            Field::PhoneNumber => {
                required(&self.phone_number, &mut errors);
                if !is_phone(&self.phone_number) {
                    errors.push(FieldError::InvalidPhone);
                }
                max_len(&self.phone_number, 20, &mut errors);
            }
            Field::Purpose => max_len(&self.purpose, 500, &mut errors),
            Field::Notes => max_len(&self.notes, 1000, &mut errors),
        }
        errors
    }

    /// The error to show for a field, only once the user has been there.
    pub fn visible_error(&self, field: Field) -> Option<FieldError> {
        if !self.is_touched(field) {
            return None;
        }
        self.errors(field).into_iter().next()
    }

    pub fn is_field_valid(&self, field: Field) -> bool {
        self.errors(field).is_empty()
    }

    pub fn is_valid(&self) -> bool {
        std::iter::once(Field::Date)
            .chain(Field::DETAILS)
            .all(|f| self.is_field_valid(f))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupField {
    Email,
    BookingReference,
}

#[derive(Debug, Clone, Default)]
pub struct LookupForm {
    pub email: String,
    pub booking_reference: String,
    touched: HashSet<LookupField>,
}

impl LookupForm {
    pub fn errors(&self, field: LookupField) -> Vec<FieldError> {
        let mut errors = Vec::new();
        match field {
            LookupField::Email => {
                required(&self.email, &mut errors);
                if !is_email(&self.email) {
                    errors.push(FieldError::InvalidEmail);
                }
            }
            LookupField::BookingReference => required(&self.booking_reference, &mut errors),
        }
        errors
    }

    pub fn mark_touched(&mut self, field: LookupField) {
        self.touched.insert(field);
    }

    pub fn visible_error(&self, field: LookupField) -> Option<FieldError> {
        if !self.touched.contains(&field) {
            return None;
        }
        self.errors(field).into_iter().next()
    }

    pub fn is_valid(&self) -> bool {
        self.errors(LookupField::Email).is_empty() && self.errors(LookupField::BookingReference).is_empty()
    }

    pub fn reset(&mut self) {
        *self = LookupForm::default();
    }
}
