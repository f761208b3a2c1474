//! Polling client for the [Telegram Bot API](https://core.telegram.org/bots/api)
//! on small network-capable devices.
//!
//! The bot keeps one long-lived connection to the server and asks for new
//! updates with short polls, one update at a time. There are no threads and
//! no async runtime: all work happens inside the calls the application makes,
//! typically [`Bot::get_new_message`] in a loop.
//!
//! The byte stream is abstracted behind [`Transport`]. [`TcpTransport`] speaks
//! plain TCP; production use against `api.telegram.org` needs a transport that
//! adds TLS, or a local TLS-terminating proxy.
//!
//! ```no_run
//! use telepoll::{Bot, BotConfig, InlineKeyboard, MessageType, ReplyOptions, TcpTransport};
//!
//! # fn main() -> telepoll::Result<()> {
//! let mut bot = Bot::new(BotConfig::new("123:abc"), TcpTransport::default())?;
//! bot.begin()?;
//!
//! let mut lights = InlineKeyboard::new();
//! lights
//!     .add_callback_button("ON", "LIGHT_ON", |_| println!("light on"))
//!     .add_callback_button("OFF", "LIGHT_OFF", |_| println!("light off"));
//! let markup = lights.to_value();
//! bot.add_callback_handler(lights);
//!
//! loop {
//!     let msg = bot.get_new_message();
//!     match msg.message_type() {
//!         MessageType::Text => {
//!             bot.send_message(&msg, "Lights:", &ReplyOptions::default(), Some(&markup))?
//!         }
//!         MessageType::Query => bot.end_query(&msg, "done", false)?,
//!         _ => {}
//!     }
//! }
//! # }
//! ```

pub use crate::client::Bot;
pub use crate::clock::{Clock, SystemClock};
pub use crate::config::BotConfig;
pub use crate::error::{Error, Result};
pub use crate::keyboard::{CallbackHandler, InlineKeyboard, ReplyKeyboard};
pub use crate::message::{
    CallbackQuery, Contact, DocumentInfo, Location, Message, MessageKind, MessageType, User,
};
pub use crate::outbound::{ParseMode, ReplyOptions};
pub use crate::stream::{TcpTransport, Transport};

mod client;
mod clock;
pub mod config;
pub mod connection;
pub mod document;
mod error;
mod keyboard;
mod message;
pub mod outbound;
pub mod sansio;
mod stream;
pub mod update;
