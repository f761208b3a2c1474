//! The bot: connection, poll scheduler, classifier and command sender wired
//! together over one [`Transport`].

use std::io::{self, Read};
use std::time::Duration;

use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::config::BotConfig;
use crate::connection::ConnectionManager;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::keyboard::CallbackHandler;
use crate::message::{DocumentInfo, Message, MessageKind, User};
use crate::outbound::{self, ReplyOptions};
use crate::sansio::protocol::{self, Multipart, END_BOUNDARY};
use crate::sansio::{ParseResult, PollScheduler};
use crate::stream::Transport;
use crate::update;

const READ_CHUNK: usize = 1024;

/// Largest `Content-Length` a blocking read waits for. Announced lengths above
/// it are ignored and the body is read as far as it is available.
const MAX_REPLY_BODY: usize = 1 << 20;

/// Binary uploads are streamed in blocks of this size.
pub const UPLOAD_BLOCK: usize = 512;

/// A polling bot client.
///
/// The bot owns its transport and never spawns threads: everything happens
/// inside the calls the application makes. A typical main loop:
///
/// ```no_run
/// use telepoll::{Bot, BotConfig, MessageType, ReplyOptions, TcpTransport};
///
/// let config = BotConfig::new("123:abc").with_host("127.0.0.1").with_port(8443);
/// let mut bot = Bot::new(config, TcpTransport::default())?;
/// bot.begin()?;
///
/// loop {
///     let msg = bot.get_new_message();
///     if msg.message_type() == MessageType::Text {
///         let text = msg.text().unwrap_or_default().to_string();
///         bot.send_message(&msg, &text, &ReplyOptions::default(), None)?;
///     }
///     std::thread::sleep(std::time::Duration::from_millis(50));
/// }
/// # Ok::<(), telepoll::Error>(())
/// ```
pub struct Bot<T, C = SystemClock> {
    config: BotConfig,
    connection: ConnectionManager<T>,
    scheduler: PollScheduler,
    clock: C,
    handlers: Vec<Box<dyn CallbackHandler>>,
    username: Option<String>,
}

impl<T: Transport> Bot<T, SystemClock> {
    pub fn new(config: BotConfig, transport: T) -> Result<Self> {
        Bot::with_clock(config, transport, SystemClock::new())
    }
}

impl<T: Transport, C: Clock> Bot<T, C> {
    pub fn with_clock(config: BotConfig, transport: T, clock: C) -> Result<Self> {
        config.validate()?;
        let now = clock.now_ms();
        Ok(Bot {
            connection: ConnectionManager::new(transport, config.host.clone(), config.port),
            scheduler: PollScheduler::new(config.min_update_interval(), now),
            config,
            clock,
            handlers: Vec::new(),
            username: None,
        })
    }

    fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    fn not_connected(&self) -> Error {
        Error::NotConnected {
            host: self.connection.host().to_string(),
            port: self.connection.port(),
        }
    }

    fn connect(&mut self) -> Result<()> {
        let now = self.now();
        if self.connection.ensure_connected(now) {
            Ok(())
        } else {
            Err(self.not_connected())
        }
    }

    /// Connect and identify the bot with `getMe`.
    pub fn begin(&mut self) -> Result<User> {
        self.connect()?;
        let me = self.get_me()?;
        tracing::info!(
            "bot {} ready",
            me.username.as_deref().unwrap_or("<unnamed>")
        );
        self.username = me.username.clone();
        Ok(me)
    }

    /// Username learned by [`begin`](Self::begin).
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn get_me(&mut self) -> Result<User> {
        let reply = self.call_command("getMe", &Value::Object(Default::default()))?;
        let me = Document::new(&reply);
        Ok(User {
            id: me.i64("/result/id").unwrap_or_default(),
            username: me.string("/result/username"),
            first_name: me.string("/result/first_name"),
            last_name: me.string("/result/last_name"),
        })
    }

    /// Tear the connection down and open a fresh one. Any outstanding
    /// request is forgotten.
    pub fn reset(&mut self) -> bool {
        tracing::info!("resetting connection");
        self.connection.close();
        let now = self.now();
        self.scheduler.on_reset(now);
        self.connection.ensure_connected(now)
    }

    pub fn connected(&self) -> bool {
        self.connection.connected()
    }

    pub fn set_update_time(&mut self, interval: Duration) {
        self.scheduler.set_min_update_interval(interval);
    }

    pub fn last_update_id(&self) -> u32 {
        self.scheduler.last_update_id()
    }

    pub fn waiting_reply(&self) -> bool {
        self.scheduler.waiting_reply()
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        self.connection.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.connection.transport_mut()
    }

    /// Register a handler offered every callback query, after those already
    /// registered.
    pub fn add_callback_handler<H: CallbackHandler + 'static>(&mut self, handler: H) {
        self.handlers.push(Box::new(handler));
    }

    /// One poll cycle: watchdog, scheduler, then drain whatever reply is
    /// available.
    ///
    /// `Ok(None)` means nothing has arrived yet.
    pub fn get_updates(&mut self) -> Result<Option<Value>> {
        let now = self.now();
        if self.scheduler.watchdog_expired(now) {
            tracing::warn!(
                "no reply for {} ms",
                now.saturating_sub(self.scheduler.last_message_at())
            );
            self.reset();
        }

        if let Some(request) = self.scheduler.poll(now) {
            tracing::debug!("polling with offset {:?}", request.offset);
            let body = serde_json::to_value(&request)?;
            self.send_command("getUpdates", &body)?;
        }

        self.receive_reply()
    }

    /// Drain a pending reply without polling.
    pub fn receive_reply(&mut self) -> Result<Option<Value>> {
        if self.connection.transport_mut().available() == 0 {
            return Ok(None);
        }

        let mut buf = Vec::new();
        let drained = drain(self.connection.transport_mut(), &mut buf);
        let now = self.now();
        self.scheduler.on_reply(now);
        drained?;

        tracing::trace!("drained {} bytes", buf.len());
        decode(&buf).map(Some)
    }

    /// Poll and classify at most one update.
    ///
    /// Failures are logged and reported as a message of type `NoData`.
    pub fn get_new_message(&mut self) -> Message {
        let reply = match self.get_updates() {
            Ok(Some(reply)) => reply,
            Ok(None) => return Message::no_data(),
            Err(e) => {
                tracing::warn!("getUpdates failed: {}", e);
                return Message::no_data();
            }
        };

        let update = match update::classify(&reply) {
            Some(update) => update,
            None => return Message::no_data(),
        };
        self.scheduler.acknowledge(update.update_id);
        tracing::debug!(
            "update {} classified as {:?}",
            update.update_id,
            update.message.message_type()
        );

        let mut message = update.message;
        match message.kind {
            MessageKind::Query(_) => {
                for handler in self.handlers.iter() {
                    handler.check_callback(&message);
                }
            }
            MessageKind::Document(ref mut doc) => {
                if let Err(e) = self.get_file(doc) {
                    tracing::error!("getFile failed: {}", e);
                }
            }
            _ => {}
        }
        message
    }

    fn write_request(&mut self, command: &str, payload: &Value) -> Result<()> {
        let transmit =
            protocol::serialize_request(&self.config.host, &self.config.token, command, payload)?;
        self.connect()?;

        self.scheduler.begin_request();
        if let Err(e) = self.connection.transport_mut().write_all(&transmit.payload) {
            self.scheduler.abort_request();
            return Err(e.into());
        }
        tracing::trace!("{}: wrote {} bytes", command, transmit.payload.len());
        Ok(())
    }

    /// Send a command without waiting for the reply; a later
    /// [`get_updates`](Self::get_updates) drains it.
    pub fn send_command(&mut self, command: &str, payload: &Value) -> Result<()> {
        tracing::debug!("{} {}", command, payload);
        self.write_request(command, payload)
    }

    /// Send a command and wait for its reply.
    pub fn call_command(&mut self, command: &str, payload: &Value) -> Result<Value> {
        if self.scheduler.waiting_reply() {
            return Err(Error::ConnectionBusy);
        }
        tracing::debug!("{} {} (blocking)", command, payload);
        self.write_request(command, payload)?;

        let mut buf = Vec::new();
        let read = read_response(self.connection.transport_mut(), &mut buf);
        let now = self.now();
        match read {
            Ok(()) => self.scheduler.on_reply(now),
            Err(e) => {
                self.scheduler.abort_request();
                tracing::error!("{}: no reply: {}", command, e);
                return Err(e);
            }
        }

        let reply = decode(&buf)?;
        if reply["ok"] == Value::Bool(true) {
            return Ok(reply);
        }

        let doc = Document::new(&reply);
        let error = Error::Api {
            code: doc.i64("/error_code").unwrap_or_default(),
            description: doc.string("/description").unwrap_or_default(),
        };
        tracing::error!("{}: {}", command, error);
        Err(error)
    }

    /// Fetch the metadata of an attached file and fill in its download URL.
    pub fn get_file(&mut self, doc: &mut DocumentInfo) -> Result<()> {
        let reply = self.call_command("getFile", &outbound::get_file(&doc.file_id))?;
        let result = Document::new(&reply);

        match result.str("/result/file_path") {
            Some(path) => {
                doc.file_path = Some(format!(
                    "https://{}/file/bot{}/{}",
                    self.config.host, self.config.token, path
                ));
                doc.file_size = result.u64("/result/file_size");
                doc.file_exists = true;
            }
            None => doc.file_exists = false,
        }
        Ok(())
    }

    /// Acknowledge every update the server still holds, so they are not
    /// delivered again. Returns how many were skipped.
    pub fn drop_pending_updates(&mut self) -> Result<usize> {
        let reply = self.call_command(
            "getUpdates",
            &outbound::drop_updates(self.scheduler.last_update_id()),
        )?;

        let pending = reply["result"].as_array().map_or(&[][..], Vec::as_slice);
        for update in pending {
            if let Some(id) = Document::new(update).u32("/update_id") {
                self.scheduler.acknowledge(id);
            }
        }
        if !pending.is_empty() {
            tracing::info!("dropped {} pending updates", pending.len());
        }
        Ok(pending.len())
    }

    /// Reply to `msg`. Empty texts are not sent.
    pub fn send_message(
        &mut self,
        msg: &Message,
        text: &str,
        options: &ReplyOptions,
        keyboard: Option<&Value>,
    ) -> Result<()> {
        if text.is_empty() {
            tracing::debug!("sendMessage: empty text, skipped");
            return Ok(());
        }
        self.send_command(
            "sendMessage",
            &outbound::send_message(msg, text, options, keyboard),
        )
    }

    pub fn send_photo_by_url(&mut self, chat_id: i64, url: &str, caption: &str) -> Result<()> {
        if url.is_empty() {
            tracing::debug!("sendPhoto: empty url, skipped");
            return Ok(());
        }
        self.send_command(
            "sendPhoto",
            &outbound::send_photo_by_url(chat_id, url, caption),
        )
    }

    pub fn send_to_channel(&mut self, channel: &str, text: &str, silent: bool) -> Result<()> {
        if text.is_empty() {
            tracing::debug!("sendMessage: empty text, skipped");
            return Ok(());
        }
        self.send_command(
            "sendMessage",
            &outbound::send_to_channel(channel, text, silent),
        )
    }

    /// Answer the callback query carried by `msg`, optionally showing `text`
    /// as a notification or, with `alert`, as a dialog.
    pub fn end_query(&mut self, msg: &Message, text: &str, alert: bool) -> Result<()> {
        let id = match msg.callback_query() {
            Some(query) if !query.id.is_empty() => query.id.as_str(),
            _ => {
                tracing::debug!("answerCallbackQuery: no query id, skipped");
                return Ok(());
            }
        };
        self.send_command(
            "answerCallbackQuery",
            &outbound::answer_callback_query(id, text, alert),
        )
    }

    pub fn remove_reply_keyboard(&mut self, msg: &Message, text: &str, selective: bool) -> Result<()> {
        let markup = outbound::remove_keyboard(selective);
        self.send_message(msg, text, &ReplyOptions::default(), Some(&markup))
    }

    /// Upload `size` bytes from `reader` as a multipart form.
    ///
    /// `command` is e.g. `sendPhoto` or `sendDocument` and `field` the name
    /// of the binary form field it expects. The connection must already be
    /// open. No reply is awaited.
    pub fn send_document<R: Read>(
        &mut self,
        chat_id: i64,
        command: &str,
        content_type: &str,
        field: &str,
        reader: R,
        size: u64,
    ) -> Result<()> {
        if !self.connection.connected() {
            return Err(self.not_connected());
        }

        let form = Multipart::new(chat_id, field, content_type);
        let head = form.serialize_head(&self.config.host, &self.config.token, command, size);
        tracing::debug!("{}: uploading {} bytes to chat {}", command, size, chat_id);

        self.scheduler.begin_request();
        let result = self.write_upload(&form, &head.payload, reader.take(size), size);
        self.scheduler.abort_request();
        if result.is_ok() {
            let now = self.now();
            self.scheduler.touch(now);
        }
        result
    }

    fn write_upload<R: Read>(
        &mut self,
        form: &Multipart,
        head: &[u8],
        mut reader: R,
        size: u64,
    ) -> Result<()> {
        let transport = self.connection.transport_mut();
        transport.write_all(head)?;
        transport.write_all(form.preamble())?;

        let mut block = [0u8; UPLOAD_BLOCK];
        let mut sent = 0u64;
        loop {
            let n = fill_block(&mut reader, &mut block)?;
            if n == 0 {
                break;
            }
            transport.write_all(&block[..n])?;
            sent += n as u64;
            if n < UPLOAD_BLOCK {
                break;
            }
            self.scheduler.touch(self.clock.now_ms());
        }

        transport.write_all(END_BOUNDARY.as_bytes())?;
        if sent != size {
            tracing::warn!("upload announced {} bytes but the source had {}", size, sent);
        }
        Ok(())
    }
}

/// Read until `block` is full or `reader` is exhausted.
fn fill_block<R: Read>(reader: &mut R, block: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < block.len() {
        match reader.read(&mut block[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read everything that is available right now.
fn drain<T: Transport>(transport: &mut T, buf: &mut Vec<u8>) -> Result<()> {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let available = transport.available();
        if available == 0 {
            return Ok(());
        }
        let n = transport.read(&mut chunk[..available.min(READ_CHUNK)])?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Read until the headers are complete, then the body.
///
/// The body is read up to `Content-Length` when the server sent a plausible
/// one, and otherwise whatever is available at that point.
fn read_response<T: Transport>(transport: &mut T, buf: &mut Vec<u8>) -> Result<()> {
    let mut chunk = [0u8; READ_CHUNK];

    let body_offset = loop {
        if let ParseResult::Complete { body_offset } = protocol::parse_message(buf) {
            break body_offset;
        }
        let n = transport.read(&mut chunk)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before the reply headers",
            )
            .into());
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    match protocol::content_length(&buf[..body_offset]) {
        Some(length) if length <= MAX_REPLY_BODY => {
            let end = body_offset + length;
            while buf.len() < end {
                let n = transport.read(&mut chunk)?;
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            Ok(())
        }
        Some(length) => {
            tracing::warn!("ignoring Content-Length {}", length);
            drain(transport, buf)
        }
        None => drain(transport, buf),
    }
}

fn decode(buf: &[u8]) -> Result<Value> {
    let reply = match protocol::parse_reply(protocol::body(buf)) {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!("undecodable reply ({} bytes): {}", buf.len(), e);
            return Err(e);
        }
    };
    if reply.get("ok").is_none() {
        tracing::warn!("reply without 'ok' field: {}", reply);
        return Err(Error::UnexpectedReply);
    }
    Ok(reply)
}
