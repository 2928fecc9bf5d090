mod callback_handlers;
mod checklist;
mod helpers;
mod message_handlers;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};
use serde::Deserialize;
use teloxide::prelude::*;
use teloxide::types::{
    BotCommand, ForceReply, InlineKeyboardButton, InlineKeyboardButtonKind, InlineKeyboardMarkup,
    Message, MessageId,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use callback_handlers::*;
use checklist::*;
use helpers::*;
use message_handlers::handle_message;

const DEFAULT_PROMPT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_FORM_TIMEOUT_SECS: u64 = 5 * 60;
const DEFAULT_ACK_TTL_SECS: u64 = 5;
const DEFAULT_KEEP_BLANK_LINES: bool = true;
const TOKEN_ENV: &str = "TOKEN";

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    token: Option<TokenInput>,
    prompt_timeout_seconds: Option<u64>,
    form_timeout_seconds: Option<u64>,
    ack_ttl_seconds: Option<u64>,
    keep_blank_lines: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenInput {
    Value(String),
    File { file: PathBuf },
}

#[derive(Debug, Clone)]
struct Config {
    token: String,
    prompt_timeout_secs: u64,
    form_timeout_secs: u64,
    ack_ttl_secs: u64,
    keep_blank_lines: bool,
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    config: PathBuf,
}

/// The issuer-only "click me" message sent for a bare `/new_todo`.
#[derive(Clone, Debug)]
struct PromptState {
    id: String,
    chat_id: i64,
    message_id: MessageId,
    issuer_id: u64,
}

/// A force-reply message waiting for the issuer's entries.
#[derive(Clone, Debug)]
struct SubmissionForm {
    form_message_id: MessageId,
    expires_at: u64,
}

struct AppState {
    config: Config,
    prompts: Mutex<HashMap<String, PromptState>>,
    forms: Mutex<HashMap<(i64, u64), SubmissionForm>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = load_config(&args.config)?;

    let state = std::sync::Arc::new(AppState {
        config: config.clone(),
        prompts: Mutex::new(HashMap::new()),
        forms: Mutex::new(HashMap::new()),
    });

    let bot = Bot::new(config.token.clone());

    if let Err(err) = bot.set_my_commands(bot_commands()).await {
        warn!("failed to register bot commands: {}", err);
    }

    info!("checklist bot starting");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
