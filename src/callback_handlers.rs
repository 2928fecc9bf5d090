use super::*;

const NOT_YOUR_BUTTON: &str = "that is not your button";
const PROMPT_TIMED_OUT: &str = "This prompt has timed out. Send /new_todo again.";

pub(super) async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: std::sync::Arc<AppState>,
) -> Result<()> {
    match callback_route(q.data.as_deref()) {
        CallbackRoute::Toggle => handle_toggle_callback(bot, q).await?,
        CallbackRoute::Prompt => handle_prompt_callback(bot, q, state).await?,
        CallbackRoute::Ignored => {
            debug!("ignoring callback data {:?}", q.data);
            bot.answer_callback_query(q.id).await?;
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
pub(super) enum CallbackRoute {
    Toggle,
    Prompt,
    Ignored,
}

pub(super) fn callback_route(data: Option<&str>) -> CallbackRoute {
    match data {
        Some(data) if is_item_id(data) => CallbackRoute::Toggle,
        Some(data) if data.starts_with("prompt:") => CallbackRoute::Prompt,
        _ => CallbackRoute::Ignored,
    }
}

fn is_message_not_modified_error(err: &teloxide::RequestError) -> bool {
    err.to_string()
        .to_ascii_lowercase()
        .contains("message is not modified")
}

async fn handle_toggle_callback(bot: Bot, q: CallbackQuery) -> Result<()> {
    let Some(message) = q.message.clone() else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };
    let activated = q.data.clone().unwrap_or_default();

    let Some(markup) = message.reply_markup() else {
        warn!(
            "toggle {} on message {} without a keyboard",
            activated, message.id.0
        );
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    let layout = layout_from_keyboard(markup);
    let next = reconcile_layout(&layout, &activated);
    let keyboard = keyboard_from_layout(&group_entries(&next));

    match bot
        .edit_message_reply_markup(message.chat.id, message.id)
        .reply_markup(keyboard)
        .await
    {
        Ok(_) => {}
        Err(err) if is_message_not_modified_error(&err) => {
            debug!("checklist {} unchanged after {}", message.id.0, activated);
        }
        Err(err) => {
            let _ = bot.answer_callback_query(q.id).await;
            return Err(anyhow::Error::from(err).context("update checklist keyboard"));
        }
    }

    bot.answer_callback_query(q.id).await?;
    Ok(())
}

enum PromptLookup {
    Found(PromptState),
    NotIssuer,
    Missing,
}

async fn handle_prompt_callback(
    bot: Bot,
    q: CallbackQuery,
    state: std::sync::Arc<AppState>,
) -> Result<()> {
    let Some(message) = q.message.clone() else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };
    let data = q.data.clone().unwrap_or_default();
    let mut parts = data.split(':');
    let _ = parts.next();
    let prompt_id = match parts.next() {
        Some(id) => id.to_string(),
        None => {
            bot.answer_callback_query(q.id).await?;
            return Ok(());
        }
    };

    match parts.next() {
        Some("open") => {}
        Some("expired") => {
            bot.answer_callback_query(q.id).text(PROMPT_TIMED_OUT).await?;
            return Ok(());
        }
        _ => {
            bot.answer_callback_query(q.id).await?;
            return Ok(());
        }
    }

    let user_id = q.from.id.0;
    let lookup = {
        let mut prompts = state.prompts.lock().await;
        let issuer = prompts.get(&prompt_id).map(|prompt| prompt.issuer_id);
        match issuer {
            None => PromptLookup::Missing,
            Some(issuer) if issuer != user_id => PromptLookup::NotIssuer,
            Some(_) => prompts
                .remove(&prompt_id)
                .map(PromptLookup::Found)
                .unwrap_or(PromptLookup::Missing),
        }
    };

    let prompt = match lookup {
        PromptLookup::Found(prompt) => prompt,
        PromptLookup::NotIssuer => {
            bot.answer_callback_query(q.id).text(NOT_YOUR_BUTTON).await?;
            return Ok(());
        }
        PromptLookup::Missing => {
            bot.answer_callback_query(q.id).text(PROMPT_TIMED_OUT).await?;
            return Ok(());
        }
    };

    let form = bot
        .send_message(
            message.chat.id,
            format!(
                "{}, reply with the to-do list entries, one per line (max {} characters each).",
                q.from.full_name(),
                MAX_LABEL_CHARS
            ),
        )
        .reply_markup(ForceReply::new())
        .await?;

    {
        let mut forms = state.forms.lock().await;
        let now = now_ts();
        prune_expired_forms(&mut forms, now);
        forms.insert(
            (prompt.chat_id, prompt.issuer_id),
            SubmissionForm {
                form_message_id: form.id,
                expires_at: now + state.config.form_timeout_secs,
            },
        );
    }

    let _ = bot
        .delete_message(ChatId(prompt.chat_id), prompt.message_id)
        .await;
    bot.answer_callback_query(q.id).await?;
    Ok(())
}
