//! Classification of the first pending update of a `getUpdates` reply.

use serde_json::Value;

use crate::document::Document;
use crate::message::{CallbackQuery, Contact, DocumentInfo, Location, Message, MessageKind, User};

/// A classified update together with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub update_id: u32,
    pub message: Message,
}

type Constructor = fn(Document<'_>) -> (MessageKind, Option<String>);

/// Message sub-classes, in priority order: the first field present wins.
const MESSAGE_CLASSES: [(&str, Constructor); 5] = [
    ("/location", location),
    ("/contact", contact),
    ("/document", document),
    ("/reply_to_message", reply),
    ("/text", text),
];

fn location(msg: Document<'_>) -> (MessageKind, Option<String>) {
    let kind = MessageKind::Location(Location {
        latitude: msg.f64("/location/latitude").unwrap_or_default(),
        longitude: msg.f64("/location/longitude").unwrap_or_default(),
    });
    (kind, None)
}

fn contact(msg: Document<'_>) -> (MessageKind, Option<String>) {
    let kind = MessageKind::Contact(Contact {
        user_id: msg.i64("/contact/user_id").unwrap_or_default(),
        first_name: msg.string("/contact/first_name"),
        last_name: msg.string("/contact/last_name"),
        phone_number: msg.string("/contact/phone_number"),
        vcard: msg.string("/contact/vcard"),
    });
    (kind, None)
}

fn document(msg: Document<'_>) -> (MessageKind, Option<String>) {
    let kind = MessageKind::Document(DocumentInfo {
        file_id: msg.string("/document/file_id").unwrap_or_default(),
        file_name: msg.string("/document/file_name"),
        ..Default::default()
    });
    (kind, msg.string("/caption"))
}

fn reply(msg: Document<'_>) -> (MessageKind, Option<String>) {
    (MessageKind::Reply, msg.string("/text"))
}

fn text(msg: Document<'_>) -> (MessageKind, Option<String>) {
    (MessageKind::Text, msg.string("/text"))
}

fn sender(from: Option<Document<'_>>) -> User {
    match from {
        Some(from) => User {
            id: from.i64("/id").unwrap_or_default(),
            username: from.string("/username"),
            first_name: from.string("/first_name"),
            last_name: from.string("/last_name"),
        },
        None => User::default(),
    }
}

/// Pick the message sub-class of a `message` object.
///
/// Returns `NoData` when none of the known fields is present.
pub fn classify_message(msg: Document<'_>) -> (MessageKind, Option<String>) {
    MESSAGE_CLASSES
        .iter()
        .find(|(field, _)| msg.truthy(field))
        .map_or((MessageKind::NoData, None), |(_, construct)| construct(msg))
}

fn callback_query(query: Document<'_>) -> Message {
    Message {
        kind: MessageKind::Query(CallbackQuery {
            id: query.string("/id").unwrap_or_default(),
            chat_instance: query.string("/chat_instance"),
            data: query.string("/data"),
        }),
        sender: sender(query.at("/from")),
        chat_id: query.i64("/message/chat/id").unwrap_or_default(),
        message_id: query.i32("/message/message_id").unwrap_or_default(),
        date: query.i64("/message/date").unwrap_or_default(),
        group_title: None,
        text: query.string("/message/text"),
    }
}

fn message(msg: Document<'_>) -> Message {
    let (kind, text) = classify_message(msg);
    Message {
        kind,
        sender: sender(msg.at("/from")),
        chat_id: msg.i64("/chat/id").unwrap_or_default(),
        message_id: msg.i32("/message_id").unwrap_or_default(),
        date: msg.i64("/date").unwrap_or_default(),
        group_title: msg.string("/chat/title"),
        text,
    }
}

/// Classify the first update of a decoded `getUpdates` reply.
///
/// `None` means there is no update to consume. An update id of `0` counts as
/// absent. A present update whose content is not understood yields a
/// [`Message`] of type `NoData` that must still be acknowledged.
pub fn classify(reply: &Value) -> Option<Update> {
    let doc = Document::new(reply);
    let update_id = doc.u32("/result/0/update_id").filter(|&id| id != 0)?;

    let message = if doc.truthy("/result/0/callback_query/id") {
        doc.at("/result/0/callback_query")
            .map_or_else(Message::no_data, callback_query)
    } else if doc.truthy("/result/0/message/message_id") {
        doc.at("/result/0/message")
            .map_or_else(Message::no_data, message)
    } else {
        Message::no_data()
    };

    Some(Update { update_id, message })
}
