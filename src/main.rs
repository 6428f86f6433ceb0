use std::error::Error;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use chat_quiz_bot::handlers::{callback_branch, command_handler, start_admin_janitor, text_handler};
use chat_quiz_bot::store::Store;
use chat_quiz_bot::{BotState, Command, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting quiz bot...");

    let config = Config::from_env()?;
    let store = Store::open(&config.data_dir).await?;
    let bot = Bot::new(config.bot_token.clone());
    log::info!(
        "Loaded {} questions, {} admins configured",
        store.questions().await.len(),
        config.admin_ids.len()
    );

    let state = Arc::new(BotState::new(config, store));

    let janitor_state = state.clone();
    tokio::spawn(async move {
        start_admin_janitor(janitor_state).await;
    });

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let handler = dptree::entry()
        .branch(Update::filter_message().filter_command::<Command>().endpoint(
            |bot: Bot, msg: Message, cmd: Command, state: Arc<BotState>| async move {
                command_handler(bot, msg, cmd, state).await
            },
        ))
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.text().is_some())
                .endpoint(|bot: Bot, msg: Message, state: Arc<BotState>| async move {
                    text_handler(bot, msg, state).await
                }),
        )
        .branch(callback_branch(state.clone()));

    log::info!("Starting command dispatching...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
