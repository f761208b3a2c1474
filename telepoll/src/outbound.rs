//! Payload builders for outbound commands.
//!
//! Each function returns the JSON body of one command. They do no I/O; the
//! [`Bot`](crate::Bot) helpers pick the command name and send the result.

use serde_derive::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::message::Message;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    MarkdownV2,
    #[serde(rename = "HTML")]
    Html,
}

impl ParseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMode::MarkdownV2 => "MarkdownV2",
            ParseMode::Html => "HTML",
        }
    }
}

/// Per-message formatting and delivery flags of [`send_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplyOptions {
    pub parse_mode: Option<ParseMode>,
    /// Deliver without a notification sound.
    pub disable_notification: bool,
    /// Ask the client to show a reply interface to the addressed user.
    pub force_reply: bool,
}

impl ReplyOptions {
    pub fn markdown() -> Self {
        ReplyOptions {
            parse_mode: Some(ParseMode::MarkdownV2),
            ..Default::default()
        }
    }

    pub fn html() -> Self {
        ReplyOptions {
            parse_mode: Some(ParseMode::Html),
            ..Default::default()
        }
    }

    pub fn silent(mut self) -> Self {
        self.disable_notification = true;
        self
    }

    pub fn force_reply(mut self) -> Self {
        self.force_reply = true;
        self
    }
}

/// `sendMessage` in answer to `msg`.
///
/// `keyboard` is any `reply_markup` object, e.g. from
/// [`InlineKeyboard::to_value`](crate::InlineKeyboard::to_value).
pub fn send_message(
    msg: &Message,
    text: &str,
    options: &ReplyOptions,
    keyboard: Option<&Value>,
) -> Value {
    let mut root = Map::new();
    root.insert("chat_id".into(), msg.reply_chat_id().into());
    root.insert("text".into(), text.into());

    if let Some(mode) = options.parse_mode {
        root.insert("parse_mode".into(), mode.as_str().into());
    }
    if options.disable_notification {
        root.insert("disable_notification".into(), true.into());
    }

    if keyboard.is_some() || options.force_reply {
        let mut markup = match keyboard {
            Some(Value::Object(m)) => m.clone(),
            _ => Map::new(),
        };
        if options.force_reply {
            markup.insert("selective".into(), true.into());
            markup.insert("force_reply".into(), true.into());
        }
        root.insert("reply_markup".into(), Value::Object(markup));
    }

    Value::Object(root)
}

pub fn send_photo_by_url(chat_id: i64, url: &str, caption: &str) -> Value {
    json!({
        "chat_id": chat_id,
        "photo": url,
        "caption": caption,
    })
}

/// `sendMessage` addressed to a channel name such as `"@mychannel"`.
pub fn send_to_channel(channel: &str, text: &str, silent: bool) -> Value {
    let mut doc = json!({
        "chat_id": channel,
        "text": text,
    });
    if silent {
        doc["disable_notification"] = true.into();
    }
    doc
}

/// `answerCallbackQuery`; `show_alert` is only sent along with a text.
pub fn answer_callback_query(query_id: &str, text: &str, alert: bool) -> Value {
    let mut doc = json!({ "callback_query_id": query_id });
    if !text.is_empty() {
        doc["text"] = text.into();
        doc["show_alert"] = alert.into();
    }
    doc
}

/// `reply_markup` hiding a custom reply keyboard.
pub fn remove_keyboard(selective: bool) -> Value {
    let mut markup = json!({ "remove_keyboard": true });
    if selective {
        markup["selective"] = true.into();
    }
    markup
}

pub fn get_file(file_id: &str) -> Value {
    json!({ "file_id": file_id })
}

/// Blocking `getUpdates` acknowledging everything up to `offset`.
pub fn drop_updates(offset: u32) -> Value {
    json!({
        "allowed_updates": crate::sansio::types::ALLOWED_UPDATES,
        "offset": offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::User;

    fn from(sender: i64, chat: i64) -> Message {
        Message {
            sender: User {
                id: sender,
                ..Default::default()
            },
            chat_id: chat,
            ..Default::default()
        }
    }

    #[test]
    fn test_send_message_plain() {
        let v = send_message(&from(9, 1), "hi", &ReplyOptions::default(), None);
        assert_eq!(v, json!({"chat_id": 9, "text": "hi"}));

        let v = send_message(&from(0, -100), "hi", &ReplyOptions::default(), None);
        assert_eq!(v["chat_id"], -100);
    }

    #[test]
    fn test_send_message_options() {
        let v = send_message(&from(9, 9), "*b*", &ReplyOptions::markdown().silent(), None);
        assert_eq!(v["parse_mode"], "MarkdownV2");
        assert_eq!(v["disable_notification"], true);
        assert!(v.get("reply_markup").is_none());

        let v = send_message(&from(9, 9), "<b>b</b>", &ReplyOptions::html(), None);
        assert_eq!(v["parse_mode"], "HTML");
        assert!(v.get("disable_notification").is_none());
    }

    #[test]
    fn test_send_message_markup() {
        let kb = json!({"inline_keyboard": [[{"text": "ON", "callback_data": "ON"}]]});
        let v = send_message(&from(9, 9), "pick", &ReplyOptions::default(), Some(&kb));
        assert_eq!(v["reply_markup"], kb);

        let v = send_message(&from(9, 9), "say", &ReplyOptions::default().force_reply(), None);
        assert_eq!(
            v["reply_markup"],
            json!({"selective": true, "force_reply": true})
        );

        let v = send_message(
            &from(9, 9),
            "bye",
            &ReplyOptions::default(),
            Some(&remove_keyboard(true)),
        );
        assert_eq!(
            v["reply_markup"],
            json!({"remove_keyboard": true, "selective": true})
        );
    }

    #[test]
    fn test_answer_callback_query() {
        assert_eq!(
            answer_callback_query("q1", "", true),
            json!({"callback_query_id": "q1"})
        );
        assert_eq!(
            answer_callback_query("q1", "done", false),
            json!({"callback_query_id": "q1", "text": "done", "show_alert": false})
        );
    }

    #[test]
    fn test_small_builders() {
        assert_eq!(
            send_to_channel("@news", "up", true),
            json!({"chat_id": "@news", "text": "up", "disable_notification": true})
        );
        assert!(send_to_channel("@news", "up", false)
            .get("disable_notification")
            .is_none());
        assert_eq!(remove_keyboard(false), json!({"remove_keyboard": true}));
        assert_eq!(
            send_photo_by_url(5, "http://x/a.jpg", ""),
            json!({"chat_id": 5, "photo": "http://x/a.jpg", "caption": ""})
        );
        assert_eq!(drop_updates(101)["offset"], 101);
        assert_eq!(serde_json::to_value(ParseMode::Html).unwrap(), "HTML");
    }
}
