use chrono::{NaiveDate, NaiveDateTime};

use crate::router::Route;

const SLOT_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Inline button payloads. Telegram caps callback data at 64 bytes, which
/// every variant stays well under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callback {
    Branch(i64),
    Page(usize),
    NextPage,
    PreviousPage,
    PageSize(usize),
    Search,
    ClearSearch,
    Date(NaiveDate),
    /// A slot, by its start time.
    Slot(NaiveDateTime),
    Back,
    Next,
    SkipField,
    Submit,
    NewBooking,
    ManageCancel,
    ManageConfirm,
    ManageClose,
    ManageReset,
    Ignore,
}

impl Callback {
    pub fn parse(data: &str) -> Option<Callback> {
        let callback = match data {
            "page:next" => Callback::NextPage,
            "page:prev" => Callback::PreviousPage,
            "search" => Callback::Search,
            "search:clear" => Callback::ClearSearch,
            "step:back" => Callback::Back,
            "step:next" => Callback::Next,
            "details:skip" => Callback::SkipField,
            "details:submit" => Callback::Submit,
            "new" => Callback::NewBooking,
            "manage:cancel" => Callback::ManageCancel,
            "manage:confirm" => Callback::ManageConfirm,
            "manage:close" => Callback::ManageClose,
            "manage:reset" => Callback::ManageReset,
            "ignore" => Callback::Ignore,
            _ => {
                let (kind, value) = data.split_once(':')?;
                match kind {
                    "branch" => Callback::Branch(value.parse().ok()?),
                    "page" => Callback::Page(value.parse().ok()?),
                    "size" => Callback::PageSize(value.parse().ok()?),
                    "date" => Callback::Date(NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?),
                    "slot" => Callback::Slot(NaiveDateTime::parse_from_str(value, SLOT_FORMAT).ok()?),
                    _ => return None,
                }
            }
        };
        Some(callback)
    }

    /// Screen the button belongs to. Presses on a screen the chat has left
    /// are stale.
    pub fn route(&self) -> Option<Route> {
        match self {
            Callback::ManageCancel | Callback::ManageConfirm | Callback::ManageClose | Callback::ManageReset => {
                Some(Route::Manage)
            }
            Callback::Ignore => None,
            _ => Some(Route::Book),
        }
    }

    pub fn data(&self) -> String {
        match self {
            Callback::Branch(id) => format!("branch:{id}"),
            Callback::Page(page) => format!("page:{page}"),
            Callback::NextPage => "page:next".into(),
            Callback::PreviousPage => "page:prev".into(),
            Callback::PageSize(size) => format!("size:{size}"),
            Callback::Search => "search".into(),
            Callback::ClearSearch => "search:clear".into(),
            Callback::Date(date) => format!("date:{}", date.format("%Y-%m-%d")),
            Callback::Slot(start) => format!("slot:{}", start.format(SLOT_FORMAT)),
            Callback::Back => "step:back".into(),
            Callback::Next => "step:next".into(),
            Callback::SkipField => "details:skip".into(),
            Callback::Submit => "details:submit".into(),
            Callback::NewBooking => "new".into(),
            Callback::ManageCancel => "manage:cancel".into(),
            Callback::ManageConfirm => "manage:confirm".into(),
            Callback::ManageClose => "manage:close".into(),
            Callback::ManageReset => "manage:reset".into(),
            Callback::Ignore => "ignore".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_parameterised_payloads() {
        assert_eq!(Callback::parse("branch:42"), Some(Callback::Branch(42)));
        assert_eq!(Callback::parse("page:3"), Some(Callback::Page(3)));
        assert_eq!(Callback::parse("size:24"), Some(Callback::PageSize(24)));
        assert_eq!(
            Callback::parse("date:2025-01-20"),
            NaiveDate::from_ymd_opt(2025, 1, 20).map(Callback::Date)
        );
        assert_eq!(
            Callback::parse("slot:2025-01-20T14:30"),
            NaiveDate::from_ymd_opt(2025, 1, 20)
                .and_then(|d| d.and_hms_opt(14, 30, 0))
                .map(Callback::Slot)
        );
        assert_eq!(Callback::parse("slot:0"), None);
    }

    #[test]
    fn fixed_payloads_win_over_prefixes() {
        assert_eq!(Callback::parse("page:next"), Some(Callback::NextPage));
        assert_eq!(Callback::parse("page:prev"), Some(Callback::PreviousPage));
        assert_eq!(Callback::parse("manage:confirm"), Some(Callback::ManageConfirm));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(Callback::parse("branch:abc"), None);
        assert_eq!(Callback::parse("date:2025-13-01"), None);
        assert_eq!(Callback::parse("photographer:any"), None);
        assert_eq!(Callback::parse(""), None);
    }

    #[test]
    fn buttons_belong_to_screens() {
        assert_eq!(Callback::Branch(1).route(), Some(Route::Book));
        assert_eq!(Callback::SkipField.route(), Some(Route::Book));
        assert_eq!(Callback::ManageReset.route(), Some(Route::Manage));
        assert_eq!(Callback::Ignore.route(), None);
    }

    #[test]
    fn data_parses_back() {
        let all = [
            Callback::Branch(7),
            Callback::Page(0),
            Callback::NextPage,
            Callback::PageSize(48),
            Callback::ClearSearch,
            Callback::Slot(NaiveDate::from_ymd_opt(2025, 2, 14).unwrap().and_hms_opt(9, 0, 0).unwrap()),
            Callback::ManageClose,
            Callback::Ignore,
        ];
        for callback in all {
            assert_eq!(Callback::parse(&callback.data()), Some(callback));
            assert!(callback.data().len() <= 64);
        }
    }
}
