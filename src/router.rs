#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    #[default]
    Book,
    Manage,
}

/// "/book@SomeBot extra" -> "book". Plain text has no command name.
pub fn command_name(text: &str) -> Option<&str> {
    let command = text.trim().strip_prefix('/')?;
    let name = command
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .split('@')
        .next()
        .unwrap_or_default();
    Some(name)
}

impl Route {
    /// Maps a chat command to a screen. Unknown commands land on the booking
    /// screen; plain text is not a route.
    pub fn from_command(text: &str) -> Option<Route> {
        match command_name(text)?.to_ascii_lowercase().as_str() {
            "manage" => Some(Route::Manage),
            _ => Some(Route::Book),
        }
    }

    pub fn command(&self) -> &'static str {
        match self {
            Route::Book => "/book",
            Route::Manage => "/manage",
        }
    }
}
