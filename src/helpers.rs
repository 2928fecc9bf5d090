use super::*;

pub(super) const INCOMPLETE_MARKER: &str = "🟥";
pub(super) const COMPLETE_MARKER: &str = "🟩";
pub(super) const PROMPT_OPEN_LABEL: &str = "click me";
pub(super) const PROMPT_EXPIRED_LABEL: &str = "Prompt Timed Out";

pub(super) const HELP_TEXT: &str = "Use /new_todo (or /nt) to create a to-do list.\n\
Put the entries on the lines after the command, one per line (max 80 characters each), \
or send /new_todo alone and click the button to open the entry form.\n\
Tap an entry to mark it done; tap it again to undo.";

pub(super) fn bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("new_todo", "Creates a new to-do list"),
        BotCommand::new("nt", "Creates a new to-do list"),
        BotCommand::new("help", "Shows how to use the bot"),
    ]
}

pub(super) fn button_text(entry: &Entry) -> String {
    let marker = if entry.complete {
        COMPLETE_MARKER
    } else {
        INCOMPLETE_MARKER
    };
    if entry.label.is_empty() {
        marker.to_string()
    } else {
        format!("{} {}", marker, entry.label)
    }
}

/// Splits a button text back into its label and completion flag. Text
/// without a marker is read as an incomplete entry.
pub(super) fn parse_button_text(text: &str) -> (String, bool) {
    for (marker, complete) in [(COMPLETE_MARKER, true), (INCOMPLETE_MARKER, false)] {
        if let Some(rest) = text.strip_prefix(marker) {
            let label = rest.strip_prefix(' ').unwrap_or(rest);
            return (label.to_string(), complete);
        }
    }
    (text.to_string(), false)
}

pub(super) fn keyboard_from_layout(layout: &[LayoutElement]) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    for element in layout {
        let row: Vec<InlineKeyboardButton> = match element {
            LayoutElement::Toggle(entry) => vec![toggle_button(entry)],
            LayoutElement::Group(children) => flatten_toggles(children)
                .iter()
                .map(toggle_button)
                .collect(),
            LayoutElement::Other(desc) => {
                debug!("not rendering non-toggle element {}", desc);
                continue;
            }
        };
        if !row.is_empty() {
            rows.push(row);
        }
    }
    InlineKeyboardMarkup::new(rows)
}

fn toggle_button(entry: &Entry) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(button_text(entry), entry.id.clone())
}

pub(super) fn layout_from_keyboard(markup: &InlineKeyboardMarkup) -> Vec<LayoutElement> {
    markup
        .inline_keyboard
        .iter()
        .map(|row| LayoutElement::Group(row.iter().map(layout_element_from_button).collect()))
        .collect()
}

fn layout_element_from_button(button: &InlineKeyboardButton) -> LayoutElement {
    match &button.kind {
        InlineKeyboardButtonKind::CallbackData(data) if is_item_id(data) => {
            let (label, complete) = parse_button_text(&button.text);
            LayoutElement::Toggle(Entry {
                id: data.clone(),
                label,
                complete,
            })
        }
        _ => LayoutElement::Other(format!("button {:?}", button.text)),
    }
}

pub(super) fn checklist_message_text(page: usize, total: usize) -> String {
    if total <= 1 {
        "To-do list".to_string()
    } else {
        format!("To-do list (page {}/{})", page + 1, total)
    }
}

pub(super) fn build_prompt_keyboard(prompt_id: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        PROMPT_OPEN_LABEL,
        format!("prompt:{}:open", prompt_id),
    )]])
}

pub(super) fn build_expired_prompt_keyboard(prompt_id: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        PROMPT_EXPIRED_LABEL,
        format!("prompt:{}:expired", prompt_id),
    )]])
}

pub(super) async fn send_ephemeral(bot: &Bot, chat_id: ChatId, text: &str, ttl_secs: u64) -> Result<()> {
    let sent = bot.send_message(chat_id, text).await?;
    let bot = bot.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(ttl_secs)).await;
        let _ = bot.delete_message(chat_id, sent.id).await;
    });
    Ok(())
}

pub(super) async fn send_error(bot: &Bot, chat_id: ChatId, text: &str) -> Result<()> {
    bot.send_message(chat_id, text).await?;
    Ok(())
}

pub(super) fn resolve_token(
    input: Option<TokenInput>,
    config_dir: &Path,
    env_token: Option<String>,
) -> Result<String> {
    let token = match input {
        Some(TokenInput::Value(raw)) => raw.trim().to_string(),
        Some(TokenInput::File { file }) => {
            let path = resolve_config_path(&file, config_dir);
            read_token_file(&path)?
        }
        None => env_token.map(|t| t.trim().to_string()).unwrap_or_default(),
    };
    if token.is_empty() {
        return Err(anyhow!("{} not set", TOKEN_ENV));
    }
    Ok(token)
}

pub(super) fn resolve_config_path(path: &Path, config_dir: &Path) -> PathBuf {
    if path.is_relative() {
        config_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

pub(super) fn read_token_file(path: &Path) -> Result<String> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read token file {}", path.display()))?;
    Ok(contents.trim().to_string())
}

pub(super) fn parse_config(contents: &str, config_dir: &Path, env_token: Option<String>) -> Result<Config> {
    let config_file: ConfigFile = toml::from_str(contents).context("parse config")?;
    let token = resolve_token(config_file.token, config_dir, env_token)?;
    Ok(Config {
        token,
        prompt_timeout_secs: config_file
            .prompt_timeout_seconds
            .unwrap_or(DEFAULT_PROMPT_TIMEOUT_SECS),
        form_timeout_secs: config_file
            .form_timeout_seconds
            .unwrap_or(DEFAULT_FORM_TIMEOUT_SECS),
        ack_ttl_secs: config_file.ack_ttl_seconds.unwrap_or(DEFAULT_ACK_TTL_SECS),
        keep_blank_lines: config_file
            .keep_blank_lines
            .unwrap_or(DEFAULT_KEEP_BLANK_LINES),
    })
}

pub(super) fn load_config(path: &Path) -> Result<Config> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let config_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_config(&contents, config_dir, std::env::var(TOKEN_ENV).ok())
}

pub(super) fn prune_expired_forms(forms: &mut HashMap<(i64, u64), SubmissionForm>, now: u64) {
    forms.retain(|_, form| form.expires_at > now);
}

pub(super) fn parse_command(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    if !first.starts_with('/') {
        return None;
    }
    let cmd = first.trim_start_matches('/');
    Some(cmd.split('@').next().unwrap_or(cmd))
}

/// Everything after the command word, with the line structure kept.
pub(super) fn command_body(text: &str) -> &str {
    text.trim_start()
        .splitn(2, |c: char| c.is_whitespace())
        .nth(1)
        .unwrap_or("")
}

pub(super) fn short_id() -> String {
    let id = Uuid::new_v4().to_string();
    id.split('-').next().unwrap_or(&id).to_string()
}

pub(super) fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}
