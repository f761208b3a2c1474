//! Inbound messages handed to the application.

use serde_derive::Serialize;

/// The payload-free tag of a [`Message`].
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    NoData,
    Text,
    Location,
    Contact,
    Document,
    Query,
    Reply,
}

#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct Contact {
    pub user_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub vcard: Option<String>,
}

/// A file attached to a message.
///
/// `file_path`, `file_size` and `file_exists` are only filled once the file
/// metadata has been fetched from the server.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct DocumentInfo {
    pub file_id: String,
    pub file_name: Option<String>,
    /// Full download URL.
    pub file_path: Option<String>,
    pub file_size: Option<u64>,
    pub file_exists: bool,
}

/// The press of an inline keyboard button.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct CallbackQuery {
    pub id: String,
    pub chat_instance: Option<String>,
    pub data: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(tag = "type", content = "payload")]
pub enum MessageKind {
    #[default]
    NoData,
    Text,
    Location(Location),
    Contact(Contact),
    Document(DocumentInfo),
    Query(CallbackQuery),
    Reply,
}

impl MessageKind {
    pub fn message_type(&self) -> MessageType {
        match self {
            MessageKind::NoData => MessageType::NoData,
            MessageKind::Text => MessageType::Text,
            MessageKind::Location(_) => MessageType::Location,
            MessageKind::Contact(_) => MessageType::Contact,
            MessageKind::Document(_) => MessageType::Document,
            MessageKind::Query(_) => MessageType::Query,
            MessageKind::Reply => MessageType::Reply,
        }
    }
}

/// One classified update.
///
/// Check [`message_type()`](Self::message_type) before looking at anything
/// else: a message of type `NoData` may still carry chat and sender fields
/// when the server sent a message kind this library does not classify.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct Message {
    pub kind: MessageKind,
    pub sender: User,
    pub chat_id: i64,
    pub message_id: i32,
    pub date: i64,
    pub group_title: Option<String>,
    pub text: Option<String>,
}

impl Message {
    pub fn no_data() -> Self {
        Message::default()
    }

    pub fn message_type(&self) -> MessageType {
        self.kind.message_type()
    }

    pub fn is_empty(&self) -> bool {
        self.message_type() == MessageType::NoData
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn callback_query(&self) -> Option<&CallbackQuery> {
        match self.kind {
            MessageKind::Query(ref q) => Some(q),
            _ => None,
        }
    }

    pub fn document(&self) -> Option<&DocumentInfo> {
        match self.kind {
            MessageKind::Document(ref d) => Some(d),
            _ => None,
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self.kind {
            MessageKind::Location(ref l) => Some(l),
            _ => None,
        }
    }

    pub fn contact(&self) -> Option<&Contact> {
        match self.kind {
            MessageKind::Contact(ref c) => Some(c),
            _ => None,
        }
    }

    /// Where a reply to this message should go: the sender for private
    /// chats, the chat otherwise.
    pub fn reply_chat_id(&self) -> i64 {
        if self.sender.id != 0 {
            self.sender.id
        } else {
            self.chat_id
        }
    }
}
