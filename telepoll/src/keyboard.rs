//! Inline and reply keyboards.

use std::fmt;

use serde_derive::Serialize;
use serde_json::Value;

use crate::message::Message;

/// Something that wants to see every callback query.
///
/// Handlers registered with [`Bot::add_callback_handler`](crate::Bot::add_callback_handler)
/// are offered each `Query` message in registration order. The return value
/// tells whether the handler recognized the query; it does not stop the
/// remaining handlers from running.
pub trait CallbackHandler {
    fn check_callback(&self, msg: &Message) -> bool;
}

impl<F> CallbackHandler for F
where
    F: Fn(&Message) -> bool,
{
    fn check_callback(&self, msg: &Message) -> bool {
        self(msg)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
enum InlineButton {
    Callback { text: String, callback_data: String },
    Url { text: String, url: String },
}

type Callback = Box<dyn Fn(&Message)>;

/// A keyboard attached to a message, whose buttons either open a URL or send
/// a callback query back to the bot.
#[derive(Default)]
pub struct InlineKeyboard {
    rows: Vec<Vec<InlineButton>>,
    callbacks: Vec<(String, Callback)>,
}

impl InlineKeyboard {
    pub fn new() -> Self {
        InlineKeyboard::default()
    }

    fn push(&mut self, button: InlineButton) {
        match self.rows.last_mut() {
            Some(row) => row.push(button),
            None => self.rows.push(vec![button]),
        }
    }

    /// Add a button sending `data` when pressed.
    pub fn add_button<S: Into<String>, D: Into<String>>(&mut self, text: S, data: D) -> &mut Self {
        self.push(InlineButton::Callback {
            text: text.into(),
            callback_data: data.into(),
        });
        self
    }

    /// Add a button sending `data`, and run `callback` whenever a query with
    /// that data arrives.
    pub fn add_callback_button<S, D, F>(&mut self, text: S, data: D, callback: F) -> &mut Self
    where
        S: Into<String>,
        D: Into<String>,
        F: Fn(&Message) + 'static,
    {
        let data = data.into();
        self.callbacks.push((data.clone(), Box::new(callback)));
        self.add_button(text, data)
    }

    pub fn add_url_button<S: Into<String>, U: Into<String>>(&mut self, text: S, url: U) -> &mut Self {
        self.push(InlineButton::Url {
            text: text.into(),
            url: url.into(),
        });
        self
    }

    /// Start a new row. Empty rows are not kept.
    pub fn add_row(&mut self) -> &mut Self {
        if self.rows.last().map_or(false, |row| !row.is_empty()) {
            self.rows.push(Vec::new());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Vec::is_empty)
    }

    /// The `reply_markup` object.
    pub fn to_value(&self) -> Value {
        let rows: Vec<&Vec<InlineButton>> = self.rows.iter().filter(|r| !r.is_empty()).collect();
        serde_json::json!({ "inline_keyboard": rows })
    }
}

impl CallbackHandler for InlineKeyboard {
    fn check_callback(&self, msg: &Message) -> bool {
        let data = match msg.callback_query().and_then(|q| q.data.as_deref()) {
            Some(data) => data,
            None => return false,
        };

        let mut found = false;
        for (_, callback) in self.callbacks.iter().filter(|(d, _)| d == data) {
            callback(msg);
            found = true;
        }
        found
    }
}

impl fmt::Debug for InlineKeyboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineKeyboard")
            .field("rows", &self.rows)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
struct ReplyButton {
    text: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    request_contact: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    request_location: bool,
}

/// A custom keyboard replacing the user's keyboard; pressing a button sends
/// its text (or the user's contact or location) as a normal message.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct ReplyKeyboard {
    keyboard: Vec<Vec<ReplyButton>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    resize_keyboard: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    one_time_keyboard: bool,
}

impl ReplyKeyboard {
    pub fn new() -> Self {
        ReplyKeyboard::default()
    }

    fn push(&mut self, button: ReplyButton) -> &mut Self {
        match self.keyboard.last_mut() {
            Some(row) => row.push(button),
            None => self.keyboard.push(vec![button]),
        }
        self
    }

    pub fn add_button<S: Into<String>>(&mut self, text: S) -> &mut Self {
        self.push(ReplyButton {
            text: text.into(),
            request_contact: false,
            request_location: false,
        })
    }

    pub fn add_contact_button<S: Into<String>>(&mut self, text: S) -> &mut Self {
        self.push(ReplyButton {
            text: text.into(),
            request_contact: true,
            request_location: false,
        })
    }

    pub fn add_location_button<S: Into<String>>(&mut self, text: S) -> &mut Self {
        self.push(ReplyButton {
            text: text.into(),
            request_contact: false,
            request_location: true,
        })
    }

    pub fn add_row(&mut self) -> &mut Self {
        if self.keyboard.last().map_or(false, |row| !row.is_empty()) {
            self.keyboard.push(Vec::new());
        }
        self
    }

    pub fn resize(&mut self, resize: bool) -> &mut Self {
        self.resize_keyboard = resize;
        self
    }

    pub fn one_time(&mut self, one_time: bool) -> &mut Self {
        self.one_time_keyboard = one_time;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keyboard.iter().all(Vec::is_empty)
    }

    pub fn to_value(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(rows) = value.get_mut("keyboard").and_then(Value::as_array_mut) {
            rows.retain(|r| r.as_array().map_or(false, |r| !r.is_empty()));
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CallbackQuery, MessageKind};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn query(data: &str) -> Message {
        Message {
            kind: MessageKind::Query(CallbackQuery {
                id: "1".into(),
                chat_instance: None,
                data: Some(data.into()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_inline_layout() {
        let mut kb = InlineKeyboard::new();
        kb.add_button("ON", "LIGHT_ON")
            .add_button("OFF", "LIGHT_OFF")
            .add_row()
            .add_row()
            .add_url_button("Docs", "https://core.telegram.org/bots/api");

        assert_eq!(
            kb.to_value(),
            json!({"inline_keyboard": [
                [{"text": "ON", "callback_data": "LIGHT_ON"},
                 {"text": "OFF", "callback_data": "LIGHT_OFF"}],
                [{"text": "Docs", "url": "https://core.telegram.org/bots/api"}]
            ]})
        );
        assert!(!kb.is_empty());
        assert!(InlineKeyboard::new().is_empty());
    }

    #[test]
    fn test_inline_callbacks() {
        let hits = Rc::new(RefCell::new(Vec::new()));
        let mut kb = InlineKeyboard::new();
        let h = hits.clone();
        kb.add_callback_button("ON", "LIGHT_ON", move |m: &Message| {
            h.borrow_mut().push(m.callback_query().unwrap().id.clone())
        });
        kb.add_button("plain", "PLAIN");

        assert!(kb.check_callback(&query("LIGHT_ON")));
        assert!(!kb.check_callback(&query("PLAIN")));
        assert!(!kb.check_callback(&query("OTHER")));
        assert!(!kb.check_callback(&Message::no_data()));
        assert_eq!(*hits.borrow(), vec!["1".to_string()]);
    }

    #[test]
    fn test_closure_handler() {
        let handler = |m: &Message| m.callback_query().is_some();
        assert!(handler.check_callback(&query("x")));
        assert!(!handler.check_callback(&Message::no_data()));
    }

    #[test]
    fn test_reply_keyboard() {
        let mut kb = ReplyKeyboard::new();
        kb.add_button("Hello")
            .add_row()
            .add_contact_button("Share contact")
            .add_location_button("Share location")
            .add_row()
            .resize(true)
            .one_time(true);

        assert_eq!(
            kb.to_value(),
            json!({
                "keyboard": [
                    [{"text": "Hello"}],
                    [{"text": "Share contact", "request_contact": true},
                     {"text": "Share location", "request_location": true}]
                ],
                "resize_keyboard": true,
                "one_time_keyboard": true
            })
        );

        let plain = ReplyKeyboard::new().add_button("a").to_value();
        assert_eq!(plain, json!({"keyboard": [[{"text": "a"}]]}));
    }
}
