use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{Local, NaiveDate, NaiveDateTime};
use log::{debug, error, info, warn};
use teloxide::{
    prelude::*,
    types::{MessageId, ParseMode},
    ApiError as TelegramError, RequestError,
};
use tokio::sync::Mutex;

use crate::{
    api::BookingApi,
    booking::{BookingWizard, Step, SEARCH_PAGE_SIZE},
    callbacks::Callback,
    error::HandlerResult,
    manage::ManageScreen,
    router::{command_name, Route},
    search::Debouncer,
    validation::{Field, LookupField},
    views::{booking_view, field_prompt, lookup_prompt, manage_view, View},
};

const SEARCH_PROMPT: &str = "Send a branch name, code or address to search. Send /clear to list all branches again.";
const HINT: &str = "Use the buttons above. /book starts a new booking, /manage looks up an existing one.";
const STALE_SCREEN: &str = "This screen is closed. Use /book or /manage.";

/// One chat's state. Its lock serializes that chat's updates only.
pub type SharedSession = Arc<Mutex<ChatSession>>;
pub type Sessions = Arc<Mutex<HashMap<i64, SharedSession>>>;

/// Everything the update handlers share.
#[derive(Clone)]
pub struct BotContext {
    pub api: Arc<dyn BookingApi>,
    pub sessions: Sessions,
    pub search_debounce: Duration,
}

impl BotContext {
    pub fn new(api: Arc<dyn BookingApi>, search_debounce: Duration) -> Self {
        BotContext {
            api,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            search_debounce,
        }
    }

    /// The chat's session, created on first contact, and whether it was
    /// just created. The map lock is only held for the lookup.
    pub async fn session(&self, chat_id: i64, today: NaiveDate) -> (SharedSession, bool) {
        let mut sessions = self.sessions.lock().await;
        let fresh = !sessions.contains_key(&chat_id);
        let session = sessions
            .entry(chat_id)
            .or_insert_with(|| Arc::new(Mutex::new(ChatSession::new(today))))
            .clone();
        (session, fresh)
    }

    pub async fn existing_session(&self, chat_id: i64) -> Option<SharedSession> {
        self.sessions.lock().await.get(&chat_id).cloned()
    }
}

/// What the next plain-text message from the chat answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Awaiting {
    Nothing,
    SearchTerm,
    Detail(Field),
    LookupEmail,
    LookupReference,
    CancelReason,
}

/// Result of a button press.
#[derive(Debug, Default)]
pub struct Reaction {
    /// New content for the message carrying the button. `None` re-renders
    /// the current screen there.
    pub replace: Option<View>,
    pub follow_up: Option<View>,
}

/// Per-chat screen state.
pub struct ChatSession {
    route: Route,
    epoch: u64,
    wizard: BookingWizard,
    manage: ManageScreen,
    awaiting: Awaiting,
    search: Option<Debouncer>,
}

impl ChatSession {
    pub fn new(today: NaiveDate) -> Self {
        ChatSession {
            route: Route::Book,
            epoch: 0,
            wizard: BookingWizard::new(today),
            manage: ManageScreen::default(),
            awaiting: Awaiting::Nothing,
            search: None,
        }
    }

    /// Navigates to `route` with fresh screen state and returns the new
    /// epoch. Work started for an earlier epoch must not touch the session.
    pub async fn open<A: BookingApi + ?Sized>(&mut self, api: &A, route: Route, today: NaiveDate) -> u64 {
        self.epoch += 1;
        self.route = route;
        self.search = None;
        match route {
            Route::Book => {
                self.wizard = BookingWizard::new(today);
                self.awaiting = Awaiting::Nothing;
                self.wizard.load_branches(api).await;
            }
            Route::Manage => {
                self.manage = ManageScreen::default();
                self.awaiting = Awaiting::LookupEmail;
            }
        }
        self.epoch
    }

    pub fn view(&self, now: NaiveDateTime) -> View {
        match self.route {
            Route::Book => booking_view(&self.wizard),
            Route::Manage => manage_view(&self.manage, now),
        }
    }

    pub fn clear_search(&mut self) {
        self.wizard.clear_search();
        if let Some(search) = &self.search {
            search.reset();
        }
        if self.awaiting == Awaiting::SearchTerm {
            self.awaiting = Awaiting::Nothing;
        }
    }

    fn answer_detail(&mut self, field: Field, value: &str) -> View {
        self.wizard.form.set(field, value.trim());
        self.wizard.form.mark_touched(field);
        if self.wizard.form.visible_error(field).is_some() {
            return field_prompt(&self.wizard, field);
        }
        match field.next_detail() {
            Some(next) => {
                self.awaiting = Awaiting::Detail(next);
                field_prompt(&self.wizard, next)
            }
            None => {
                self.awaiting = Awaiting::Nothing;
                booking_view(&self.wizard)
            }
        }
    }

    /// Handles typed text. Returns the message to send back, if any.
    pub async fn apply_text<A: BookingApi + ?Sized>(
        &mut self,
        api: &A,
        text: &str,
        now: NaiveDateTime,
    ) -> Option<View> {
        match self.awaiting {
            Awaiting::SearchTerm => match &self.search {
                Some(search) => {
                    search.push(text);
                    None
                }
                None => {
                    self.wizard.search(api, text).await;
                    Some(booking_view(&self.wizard))
                }
            },
            Awaiting::Detail(field) => Some(self.answer_detail(field, text)),
            Awaiting::LookupEmail => {
                let form = &mut self.manage.lookup_form;
                form.email = text.trim().to_string();
                form.mark_touched(LookupField::Email);
                if form.visible_error(LookupField::Email).is_some() {
                    return Some(lookup_prompt(form, LookupField::Email));
                }
                self.awaiting = Awaiting::LookupReference;
                Some(lookup_prompt(form, LookupField::BookingReference))
            }
            Awaiting::LookupReference => {
                let form = &mut self.manage.lookup_form;
                form.booking_reference = text.trim().to_string();
                form.mark_touched(LookupField::BookingReference);
                if form.visible_error(LookupField::BookingReference).is_some() {
                    return Some(lookup_prompt(form, LookupField::BookingReference));
                }
                self.manage.lookup_appointment(api).await;
                self.awaiting = Awaiting::Nothing;
                Some(manage_view(&self.manage, now))
            }
            Awaiting::CancelReason => {
                self.manage.cancel_reason = text.trim().to_string();
                Some(manage_view(&self.manage, now))
            }
            Awaiting::Nothing => Some(View::notice(HINT)),
        }
    }

    pub async fn apply_callback<A: BookingApi + ?Sized>(
        &mut self,
        api: &A,
        callback: Callback,
        today: NaiveDate,
        now: NaiveDateTime,
    ) -> Reaction {
        let mut reaction = Reaction::default();
        match callback {
            Callback::Branch(id) => {
                self.wizard.select_branch_by_id(api, id).await;
            }
            Callback::Page(page) => {
                self.wizard.go_to_page(api, page).await;
            }
            Callback::NextPage => {
                self.wizard.next_page(api).await;
            }
            Callback::PreviousPage => {
                self.wizard.previous_page(api).await;
            }
            Callback::PageSize(size) => {
                self.wizard.change_page_size(api, size).await;
            }
            Callback::Search => {
                self.awaiting = Awaiting::SearchTerm;
                reaction.follow_up = Some(View::notice(SEARCH_PROMPT));
            }
            Callback::ClearSearch => self.clear_search(),
            Callback::Date(date) => {
                if self.wizard.date_in_window(date) {
                    self.wizard.change_date(api, date).await;
                }
            }
            Callback::Slot(start) => {
                let slot = self
                    .wizard
                    .available_slots()
                    .iter()
                    .find(|slot| slot.start_time == start)
                    .cloned();
                match slot {
                    Some(slot) => {
                        self.wizard.select_time_slot(&slot);
                    }
                    None => debug!("slot at {start} is no longer listed"),
                }
            }
            Callback::Back => {
                self.wizard.previous_step();
                self.awaiting = Awaiting::Nothing;
            }
            Callback::Next => {
                if self.wizard.step() == Step::Slot && self.wizard.can_proceed_to_details() {
                    self.wizard.next_step();
                    self.awaiting = Awaiting::Detail(Field::FirstName);
                    reaction.follow_up = Some(field_prompt(&self.wizard, Field::FirstName));
                }
            }
            Callback::SkipField => match self.awaiting {
                Awaiting::Detail(field) if field.is_optional() => {
                    reaction.replace = Some(View::notice(format!("{}: skipped", field.label())));
                    reaction.follow_up = Some(self.answer_detail(field, ""));
                }
                _ => reaction.replace = Some(View::notice("Already answered.")),
            },
            Callback::Submit => {
                if self.wizard.step() == Step::Details {
                    self.wizard.submit_booking(api).await;
                    self.awaiting = Awaiting::Nothing;
                }
            }
            Callback::NewBooking => {
                self.wizard.start_new_booking(today);
                self.awaiting = Awaiting::Nothing;
                if self.wizard.branches().is_empty() {
                    self.wizard.load_branches(api).await;
                }
            }
            Callback::ManageCancel => {
                if self.manage.can_cancel_appointment(now) && self.manage.show_cancel_confirmation() {
                    self.awaiting = Awaiting::CancelReason;
                }
            }
            Callback::ManageConfirm => {
                if self.manage.is_cancel_dialog_open() {
                    self.manage.cancel_appointment(api).await;
                    if !self.manage.is_cancel_dialog_open() {
                        self.awaiting = Awaiting::Nothing;
                    }
                }
            }
            Callback::ManageClose => {
                self.manage.close_cancel_dialog();
                self.awaiting = Awaiting::Nothing;
            }
            Callback::ManageReset => {
                self.manage.reset();
                self.awaiting = Awaiting::LookupEmail;
            }
            Callback::Ignore => {}
        }
        reaction
    }
}

async fn show(bot: &Bot, chat_id: ChatId, view: View) -> HandlerResult {
    let has_buttons = view.has_buttons();
    let mut request = bot.send_message(chat_id, view.text).parse_mode(ParseMode::Html);
    if has_buttons {
        request = request.reply_markup(view.markup);
    }
    request.await?;
    Ok(())
}

async fn replace(bot: &Bot, chat_id: ChatId, message_id: MessageId, view: View) -> HandlerResult {
    let result = bot
        .edit_message_text(chat_id, message_id, view.text)
        .parse_mode(ParseMode::Html)
        .reply_markup(view.markup)
        .await;
    match result {
        Ok(_) | Err(RequestError::Api(TelegramError::MessageNotModified)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn spawn_search(bot: Bot, ctx: BotContext, chat_id: ChatId, epoch: u64) -> Debouncer {
    Debouncer::spawn(ctx.search_debounce, move |value| {
        let bot = bot.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = run_search(&bot, &ctx, chat_id, epoch, value).await {
                error!("Search for chat {chat_id} failed: {e}");
            }
        });
    })
}

/// Applies one settled search value to the chat. The chat lock is released
/// while the backend answers. Returns the screen to show, or `None` when the
/// chat navigated away or a newer search overtook this one.
pub async fn apply_settled_search(ctx: &BotContext, chat_id: i64, epoch: u64, value: &str) -> Option<View> {
    let shared = ctx.existing_session(chat_id).await?;
    let ticket = {
        let mut session = shared.lock().await;
        if session.epoch != epoch {
            return None;
        }
        session.wizard.apply_search_input(value)
    };

    if let Some(ticket) = ticket {
        let result = ctx.api.search_branches(&ticket.query, 0, SEARCH_PAGE_SIZE).await;
        let mut session = shared.lock().await;
        if session.epoch != epoch || !session.wizard.finish_search(&ticket, result) {
            return None;
        }
        return Some(booking_view(&session.wizard));
    }

    let session = shared.lock().await;
    (session.epoch == epoch).then(|| booking_view(&session.wizard))
}

async fn run_search(bot: &Bot, ctx: &BotContext, chat_id: ChatId, epoch: u64, value: String) -> HandlerResult {
    match apply_settled_search(ctx, chat_id.0, epoch, &value).await {
        Some(view) => show(bot, chat_id, view).await,
        None => Ok(()),
    }
}

pub async fn handle_message(msg: Message, bot: Bot, ctx: BotContext) -> HandlerResult {
    let chat_id = msg.chat.id;
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let today = Local::now().date_naive();
    let now = Local::now().naive_local();

    let (shared, fresh) = ctx.session(chat_id.0, today).await;
    let mut session = shared.lock().await;

    if command_name(text).is_some_and(|name| name.eq_ignore_ascii_case("clear")) {
        session.clear_search();
        let view = session.view(now);
        drop(session);
        return show(&bot, chat_id, view).await;
    }

    let reply = match Route::from_command(text).or(fresh.then_some(Route::Book)) {
        Some(route) => {
            info!("Chat {chat_id} opened {}", route.command());
            let epoch = session.open(ctx.api.as_ref(), route, today).await;
            if route == Route::Book {
                session.search = Some(spawn_search(bot.clone(), ctx.clone(), chat_id, epoch));
            }
            Some(session.view(now))
        }
        None => session.apply_text(ctx.api.as_ref(), text, now).await,
    };
    drop(session);

    if let Some(view) = reply {
        show(&bot, chat_id, view).await?;
    }
    Ok(())
}

pub async fn handle_callback_query(q: CallbackQuery, bot: Bot, ctx: BotContext) -> HandlerResult {
    let Some(callback) = q.data.as_deref().and_then(Callback::parse) else {
        warn!("Unknown callback data {:?}", q.data);
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    let Some(message) = q.message.as_ref().and_then(|m| m.regular_message()) else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    let chat_id = message.chat.id;
    debug!("Chat {chat_id} pressed {}", callback.data());

    if callback == Callback::Ignore {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    }

    let today = Local::now().date_naive();
    let now = Local::now().naive_local();

    let Some(shared) = ctx.existing_session(chat_id.0).await else {
        bot.answer_callback_query(q.id.clone()).text(STALE_SCREEN).await?;
        return Ok(());
    };
    let mut session = shared.lock().await;
    if callback.route().is_some_and(|route| route != session.route) {
        drop(session);
        bot.answer_callback_query(q.id.clone()).text(STALE_SCREEN).await?;
        return Ok(());
    }

    bot.answer_callback_query(q.id.clone()).await?;
    let reaction = session.apply_callback(ctx.api.as_ref(), callback, today, now).await;
    let screen = match reaction.replace {
        Some(view) => view,
        None => session.view(now),
    };
    drop(session);

    replace(&bot, chat_id, message.id, screen).await?;
    if let Some(view) = reaction.follow_up {
        show(&bot, chat_id, view).await?;
    }
    Ok(())
}
