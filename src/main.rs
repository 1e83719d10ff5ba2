use std::sync::Arc;

use log::{error, info, warn};
use teloxide::{
    dispatching::UpdateFilterExt,
    prelude::*,
    types::{BotCommand, CallbackQuery},
};

mod api;
mod booking;
mod callbacks;
mod config;
mod error;
mod handlers;
mod manage;
mod models;
mod router;
mod search;
#[cfg(test)]
mod testing;
mod validation;
mod views;

use api::ApiClient;
use config::Config;
use handlers::{handle_callback_query, handle_message, BotContext};

fn commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("book", "Book a branch appointment"),
        BotCommand::new("manage", "Look up or cancel an appointment"),
        BotCommand::new("clear", "Clear the branch search"),
    ]
}

#[tokio::main]
async fn main() {
    // read first so RUST_LOG from .env reaches the logger
    let config = Config::from_env();
    pretty_env_logger::init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return;
        }
    };
    let api = match ApiClient::new(&config) {
        Ok(api) => api,
        Err(e) => {
            error!("Cannot build the booking API client: {e}");
            return;
        }
    };
    info!("Booking API at {}", config.api_url);

    let bot = Bot::from_env();
    if let Err(e) = bot.set_my_commands(commands()).await {
        warn!("Could not register bot commands: {e}");
    }

    let ctx = BotContext::new(Arc::new(api), config.search_debounce);

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint({
            let ctx = ctx.clone();
            move |bot: Bot, msg: Message| {
                let ctx = ctx.clone();
                async move {
                    if let Err(e) = handle_message(msg, bot, ctx).await {
                        error!("Message handler failed: {e}");
                    }
                    respond(())
                }
            }
        }))
        .branch(Update::filter_callback_query().endpoint({
            let ctx = ctx.clone();
            move |q: CallbackQuery, bot: Bot| {
                let ctx = ctx.clone();
                async move {
                    if let Err(e) = handle_callback_query(q, bot, ctx).await {
                        error!("Callback handler failed: {e}");
                    }
                    respond(())
                }
            }
        }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
