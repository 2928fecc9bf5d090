use super::*;

pub(super) async fn handle_message(bot: Bot, msg: Message, state: std::sync::Arc<AppState>) -> Result<()> {
    let user = match msg.from() {
        Some(user) => user.clone(),
        None => return Ok(()),
    };

    let text = match msg.text() {
        Some(text) => text.to_string(),
        None => return Ok(()),
    };

    let mut expired_form: Option<SubmissionForm> = None;
    let pending_form = {
        let mut forms = state.forms.lock().await;
        if let Some(form) = forms.remove(&(msg.chat.id.0, user.id.0)) {
            if form.expires_at > now_ts() {
                Some(form)
            } else {
                expired_form = Some(form);
                None
            }
        } else {
            None
        }
    };

    if let Some(form) = expired_form {
        let _ = bot.delete_message(msg.chat.id, form.form_message_id).await;
    }

    if let Some(form) = pending_form {
        let _ = bot.delete_message(msg.chat.id, form.form_message_id).await;
        if parse_command(&text).is_none() {
            submit_entries(&bot, msg.chat.id, &state, &text).await?;
            return Ok(());
        }
        // A command abandons the open form and runs as usual.
    }

    let Some(cmd) = parse_command(&text) else {
        return Ok(());
    };

    match cmd.to_ascii_lowercase().as_str() {
        "start" | "help" => {
            bot.send_message(msg.chat.id, HELP_TEXT).await?;
        }
        "new_todo" | "nt" => {
            let body = command_body(&text);
            if body.trim().is_empty() {
                start_prompt(&bot, &msg, &state, &user).await?;
            } else {
                submit_entries(&bot, msg.chat.id, &state, body).await?;
            }
        }
        _ => {}
    }

    Ok(())
}

/// Turns submitted text into checklist messages, one per page.
pub(super) async fn submit_entries(
    bot: &Bot,
    chat_id: ChatId,
    state: &std::sync::Arc<AppState>,
    raw: &str,
) -> Result<()> {
    let entries = match intake_entries(raw, state.config.keep_blank_lines) {
        Ok(entries) => entries,
        Err(err) => {
            send_error(bot, chat_id, &err.to_string()).await?;
            return Ok(());
        }
    };

    if let Err(err) = send_ephemeral(bot, chat_id, "Creating to-do list.", state.config.ack_ttl_secs).await {
        warn!("failed to acknowledge submission in chat {}: {:#}", chat_id.0, err);
    }

    let pages = paginate(&entries).context("paginate entries")?;
    let total = pages.len();
    for (page, checklist) in pages.iter().enumerate() {
        let keyboard = keyboard_from_layout(&checklist.layout());
        bot.send_message(chat_id, checklist_message_text(page, total))
            .reply_markup(keyboard)
            .await
            .with_context(|| format!("send checklist page {}/{}", page + 1, total))?;
        debug!(
            "posted checklist page {}/{} with {} entries in chat {}",
            page + 1,
            total,
            checklist.len(),
            chat_id.0
        );
    }

    info!(
        "created to-do list with {} entries across {} message(s) in chat {}",
        entries.len(),
        total,
        chat_id.0
    );
    Ok(())
}

async fn start_prompt(
    bot: &Bot,
    msg: &Message,
    state: &std::sync::Arc<AppState>,
    user: &teloxide::types::User,
) -> Result<()> {
    let prompt_id = short_id();
    let sent = bot
        .send_message(
            msg.chat.id,
            format!("{}, click below to create a to-do list.", user.full_name()),
        )
        .reply_markup(build_prompt_keyboard(&prompt_id))
        .await?;

    state.prompts.lock().await.insert(
        prompt_id.clone(),
        PromptState {
            id: prompt_id.clone(),
            chat_id: msg.chat.id.0,
            message_id: sent.id,
            issuer_id: user.id.0,
        },
    );
    schedule_prompt_expiry(bot.clone(), state.clone(), prompt_id);

    let _ = bot.delete_message(msg.chat.id, msg.id).await;
    Ok(())
}

fn schedule_prompt_expiry(bot: Bot, state: std::sync::Arc<AppState>, prompt_id: String) {
    let ttl_secs = state.config.prompt_timeout_secs;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(ttl_secs)).await;
        let prompt = state.prompts.lock().await.remove(&prompt_id);
        let Some(prompt) = prompt else {
            return;
        };
        let result = bot
            .edit_message_reply_markup(ChatId(prompt.chat_id), prompt.message_id)
            .reply_markup(build_expired_prompt_keyboard(&prompt.id))
            .await;
        if let Err(err) = result {
            error!("failed to expire prompt {}: {}", prompt.id, err);
        }
    });
}
