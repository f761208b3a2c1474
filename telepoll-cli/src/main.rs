use std::fs::File;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use clap_complete::{generate, Shell};
use colored_json::{Color, ColorMode, ColoredFormatter, Output, Paint, PrettyFormatter, Style, Styler};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use telepoll::outbound;
use telepoll::{Bot, BotConfig, Message, MessageType, ReplyOptions, TcpTransport};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + 'static + Send + Sync>>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pause between two poll cycles of `telepoll poll`.
const POLL_PAUSE: Duration = Duration::from_millis(20);

/// How long `telepoll upload` waits for the server to confirm an upload.
const UPLOAD_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

fn init_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(matches: &ArgMatches) -> Result<BotConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => {
            let file = File::open(path).map_err(|e| format!("Failed to open '{path}': {e}"))?;
            serde_json::from_reader(file).map_err(|e| format!("Failed to parse '{path}': {e}"))?
        }
        None => BotConfig::default(),
    };

    if let Some(token) = matches.get_one::<String>("token") {
        config.token = token.clone();
    }
    if let Some(host) = matches.get_one::<String>("host") {
        config.host = host.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }
    if let Some(interval) = matches.get_one::<u64>("interval") {
        config.min_update_interval_ms = *interval;
    }

    config.validate()?;
    tracing::debug!("{:?}", config);
    Ok(config)
}

fn open_bot(matches: &ArgMatches) -> Result<Bot<TcpTransport>> {
    let config = load_config(matches)?;
    let address = format!("{}:{}", config.host, config.port);
    let transport = TcpTransport::new(config.connect_timeout(), config.read_timeout());

    let mut bot = Bot::new(config, transport)?;
    bot.begin()
        .map_err(|e| format!("Failed to start bot at '{address}': {e}"))?;
    Ok(bot)
}

fn print_json(value: &Value, should_colorize: bool) -> Result<()> {
    let color_mode = if should_colorize {
        ColorMode::On
    } else {
        ColorMode::Off
    };

    let cf = ColoredFormatter::with_styler(
        PrettyFormatter::new(),
        Styler {
            key: Color::Cyan.foreground(),
            string_value: Color::Magenta.foreground(),
            integer_value: Color::Magenta.foreground(),
            float_value: Color::Magenta.foreground(),
            bool_value: Color::Magenta.foreground(),
            nil_value: Color::Magenta.foreground(),
            ..Default::default()
        },
    );

    println!(
        "{}",
        cf.to_colored_json(value, color_mode)
            .map_err(|e| format!("Failed to print json for '{value}': {e}"))?
    );
    Ok(())
}

/// Drain replies until one arrives or `timeout` passes.
fn wait_reply(bot: &mut Bot<TcpTransport>, timeout: Duration) -> Result<Option<Value>> {
    let start = Instant::now();
    loop {
        if let Some(reply) = bot.receive_reply()? {
            return Ok(Some(reply));
        }
        if start.elapsed() > timeout {
            return Ok(None);
        }
        thread::sleep(POLL_PAUSE);
    }
}

fn telepoll_me(matches: &ArgMatches, should_colorize: bool) -> Result<()> {
    let bot = open_bot(matches)?;
    let username = bot.username().unwrap_or_default();
    let bold: fn(w: &str) -> String = if should_colorize {
        static BOLD: Style = Style::new().bold();
        |w| w.paint(BOLD).to_string()
    } else {
        |w| w.to_string()
    };

    println!("{} {}", bold("Username:"), username);
    println!("{} {}:{}", bold("Server:"), bot.config().host, bot.config().port);
    println!(
        "{} {} ms",
        bold("Poll interval:"),
        bot.config().min_update_interval_ms
    );
    Ok(())
}

fn telepoll_poll(
    matches: &ArgMatches,
    echo: bool,
    count: Option<usize>,
    drop_pending: bool,
    should_colorize: bool,
) -> Result<()> {
    let mut bot = open_bot(matches)?;

    if drop_pending {
        let dropped = bot
            .drop_pending_updates()
            .map_err(|e| format!("Failed to drop pending updates: {e}"))?;
        tracing::info!("skipped {} pending updates", dropped);
    }

    let mut received = 0;
    while count.map_or(true, |count| received < count) {
        let msg = bot.get_new_message();
        if msg.is_empty() {
            thread::sleep(POLL_PAUSE);
            continue;
        }

        print_json(&serde_json::to_value(&msg)?, should_colorize)?;
        received += 1;

        if !echo {
            continue;
        }
        match msg.message_type() {
            MessageType::Text => {
                let text = msg.text().unwrap_or_default().to_string();
                bot.send_message(&msg, &text, &ReplyOptions::default(), None)?
            }
            MessageType::Query => {
                let data = msg
                    .callback_query()
                    .and_then(|q| q.data.clone())
                    .unwrap_or_default();
                bot.end_query(&msg, &data, false)?
            }
            _ => {}
        }
    }
    Ok(())
}

fn telepoll_send(
    matches: &ArgMatches,
    chat: &str,
    text: &str,
    options: ReplyOptions,
    should_colorize: bool,
) -> Result<()> {
    let payload = match chat.parse::<i64>() {
        Ok(chat_id) => {
            let target = Message {
                chat_id,
                ..Default::default()
            };
            outbound::send_message(&target, text, &options, None)
        }
        Err(_) => outbound::send_to_channel(chat, text, options.disable_notification),
    };

    let mut bot = open_bot(matches)?;
    let reply = bot
        .call_command("sendMessage", &payload)
        .map_err(|e| format!("Failed to send to '{chat}': {e}"))?;
    print_json(&reply["result"], should_colorize)
}

fn telepoll_photo(
    matches: &ArgMatches,
    chat_id: i64,
    url: &str,
    caption: &str,
    should_colorize: bool,
) -> Result<()> {
    let mut bot = open_bot(matches)?;
    let reply = bot
        .call_command(
            "sendPhoto",
            &outbound::send_photo_by_url(chat_id, url, caption),
        )
        .map_err(|e| format!("Failed to send '{url}': {e}"))?;
    print_json(&reply["result"], should_colorize)
}

fn telepoll_upload(
    matches: &ArgMatches,
    chat_id: i64,
    path: &str,
    command: &str,
    field: &str,
    content_type: &str,
    should_colorize: bool,
) -> Result<()> {
    let file = File::open(path).map_err(|e| format!("Failed to open '{path}': {e}"))?;
    let size = file
        .metadata()
        .map_err(|e| format!("Failed to read '{path}': {e}"))?
        .len();

    let mut bot = open_bot(matches)?;
    bot.send_document(chat_id, command, content_type, field, file, size)
        .map_err(|e| format!("Failed to upload '{path}': {e}"))?;

    match wait_reply(&mut bot, UPLOAD_REPLY_TIMEOUT)? {
        Some(reply) => print_json(&reply, should_colorize),
        None => Err(format!("No reply for the upload of '{path}'").into()),
    }
}

fn chat_arg(help: &'static str) -> Arg {
    Arg::new("CHAT")
        .required(true)
        .allow_negative_numbers(true)
        .help(help)
}

fn cli() -> Command {
    Command::new("telepoll")
        .version(VERSION)
        .about("Talk to a Telegram bot over a plain TCP connection")
        .long_about(
            "Talk to a Telegram bot over a plain TCP connection. No TLS is spoken: point \
             --host and --port at a TLS-terminating proxy in front of the Bot API server.",
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("log more, repeat for even more"),
        )
        .arg(
            Arg::new("color")
                .long("color")
                .value_parser(["on", "off", "auto"])
                .default_value("auto")
                .help("colorize output"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file"),
        )
        .arg(
            Arg::new("token")
                .short('t')
                .long("token")
                .value_name("TOKEN")
                .env("TELEPOLL_TOKEN")
                .hide_env_values(true)
                .help("bot token"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Bot API server, or the proxy in front of it"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("interval")
                .long("interval")
                .value_name("MS")
                .value_parser(value_parser!(u64))
                .help("minimum time between two polls"),
        )
        .subcommand(Command::new("me").about("Connect and print information about the bot"))
        .subcommand(
            Command::new("poll")
                .about("Print incoming messages as JSON")
                .arg(
                    Arg::new("echo")
                        .long("echo")
                        .action(ArgAction::SetTrue)
                        .help("answer text messages and button presses with their own content"),
                )
                .arg(
                    Arg::new("count")
                        .short('n')
                        .long("count")
                        .value_name("N")
                        .value_parser(value_parser!(usize))
                        .help("exit after N messages"),
                )
                .arg(
                    Arg::new("drop-pending")
                        .long("drop-pending")
                        .action(ArgAction::SetTrue)
                        .help("skip updates that arrived before startup"),
                ),
        )
        .subcommand(
            Command::new("send")
                .about("Send a text message")
                .arg(chat_arg("chat id, or @name of a channel"))
                .arg(Arg::new("TEXT").required(true))
                .arg(
                    Arg::new("markdown")
                        .long("markdown")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("html")
                        .help("parse TEXT as MarkdownV2"),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .action(ArgAction::SetTrue)
                        .help("parse TEXT as HTML"),
                )
                .arg(
                    Arg::new("silent")
                        .long("silent")
                        .action(ArgAction::SetTrue)
                        .help("deliver without notification"),
                ),
        )
        .subcommand(
            Command::new("photo")
                .about("Send a photo by URL")
                .arg(chat_arg("chat id").value_parser(value_parser!(i64)))
                .arg(Arg::new("URL").required(true))
                .arg(
                    Arg::new("caption")
                        .long("caption")
                        .value_name("TEXT")
                        .default_value(""),
                ),
        )
        .subcommand(
            Command::new("upload")
                .about("Upload a local file")
                .arg(chat_arg("chat id").value_parser(value_parser!(i64)))
                .arg(Arg::new("FILE").required(true))
                .arg(
                    Arg::new("command")
                        .long("command")
                        .value_name("COMMAND")
                        .default_value("sendDocument")
                        .help("upload command, e.g. sendPhoto"),
                )
                .arg(
                    Arg::new("field")
                        .long("field")
                        .value_name("NAME")
                        .default_value("document")
                        .help("form field carrying the file, e.g. photo"),
                )
                .arg(
                    Arg::new("content-type")
                        .long("content-type")
                        .value_name("MIME")
                        .default_value("application/octet-stream"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generates completion scripts for your shell")
                .arg(
                    Arg::new("SHELL")
                        .required(true)
                        .value_parser(value_parser!(Shell))
                        .help("The shell to generate the script for"),
                ),
        )
}

fn required<'a, T>(matches: &'a ArgMatches, id: &str) -> Result<&'a T>
where
    T: std::any::Any + Clone + Send + Sync + 'static,
{
    matches
        .get_one::<T>(id)
        .ok_or_else(|| format!("Missing argument {id}").into())
}

fn should_colorize(matches: &ArgMatches) -> bool {
    match matches.get_one::<String>("color").map(String::as_str) {
        Some("on") => true,
        Some("off") => false,
        _ => ColorMode::should_colorize(Output::StdOut),
    }
}

fn do_main(app: &mut Command, matches: &ArgMatches) -> Result<()> {
    let should_colorize = should_colorize(matches);

    match matches.subcommand() {
        Some(("completions", sub)) => {
            let shell = *required::<Shell>(sub, "SHELL")?;
            generate(shell, app, "telepoll", &mut io::stdout());
        }
        Some(("me", _)) => telepoll_me(matches, should_colorize)?,
        Some(("poll", sub)) => telepoll_poll(
            matches,
            sub.get_flag("echo"),
            sub.get_one::<usize>("count").copied(),
            sub.get_flag("drop-pending"),
            should_colorize,
        )?,
        Some(("send", sub)) => {
            let mut options = if sub.get_flag("markdown") {
                ReplyOptions::markdown()
            } else if sub.get_flag("html") {
                ReplyOptions::html()
            } else {
                ReplyOptions::default()
            };
            options.disable_notification = sub.get_flag("silent");

            telepoll_send(
                matches,
                required::<String>(sub, "CHAT")?,
                required::<String>(sub, "TEXT")?,
                options,
                should_colorize,
            )?
        }
        Some(("photo", sub)) => telepoll_photo(
            matches,
            *required::<i64>(sub, "CHAT")?,
            required::<String>(sub, "URL")?,
            required::<String>(sub, "caption")?,
            should_colorize,
        )?,
        Some(("upload", sub)) => telepoll_upload(
            matches,
            *required::<i64>(sub, "CHAT")?,
            required::<String>(sub, "FILE")?,
            required::<String>(sub, "command")?,
            required::<String>(sub, "field")?,
            required::<String>(sub, "content-type")?,
            should_colorize,
        )?,
        _ => {
            app.print_help()
                .map_err(|e| format!("Couldn't print help: {e}"))?;
            println!();
        }
    }
    Ok(())
}

fn main() {
    let mut app = cli();
    let matches = app.clone().get_matches();
    init_logging(matches.get_count("verbose"));

    if let Err(e) = do_main(&mut app, &matches) {
        let red_bold: fn(w: &str) -> String = if should_colorize(&matches) {
            |w| w.paint(Color::Red.bold()).to_string()
        } else {
            |w| w.to_string()
        };
        eprintln!("{} {}", red_bold("Error:"), e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_send_arguments() {
        let matches = cli()
            .try_get_matches_from([
                "telepoll", "--token", "1:a", "send", "-1001234", "hello there", "--markdown",
                "--silent",
            ])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "send");
        assert_eq!(required::<String>(sub, "CHAT").unwrap(), "-1001234");
        assert_eq!(required::<String>(sub, "TEXT").unwrap(), "hello there");
        assert!(sub.get_flag("markdown"));
        assert!(sub.get_flag("silent"));

        assert!(cli()
            .try_get_matches_from(["telepoll", "send", "1", "x", "--markdown", "--html"])
            .is_err());
    }

    #[test]
    fn test_upload_defaults() {
        let matches = cli()
            .try_get_matches_from(["telepoll", "upload", "-42", "cat.jpg"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(*required::<i64>(sub, "CHAT").unwrap(), -42);
        assert_eq!(required::<String>(sub, "command").unwrap(), "sendDocument");
        assert_eq!(required::<String>(sub, "field").unwrap(), "document");
        assert_eq!(
            required::<String>(sub, "content-type").unwrap(),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_config_file_and_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"token": "9:file", "host": "proxy.local", "port": 8080, "min_update_interval_ms": 1000}}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let matches = cli()
            .try_get_matches_from(["telepoll", "--config", path, "--token", "9:flag", "--port", "9090", "me"])
            .unwrap();
        let config = load_config(&matches).unwrap();
        assert_eq!(config.token, "9:flag");
        assert_eq!(config.host, "proxy.local");
        assert_eq!(config.port, 9090);
        assert_eq!(config.min_update_interval_ms, 1000);
        assert_eq!(config.read_timeout_ms, telepoll::config::DEFAULT_READ_TIMEOUT_MS);
    }

    #[test]
    fn test_invalid_config() {
        let matches = cli()
            .try_get_matches_from(["telepoll", "--token", "1:a", "--interval", "0", "me"])
            .unwrap();
        let e = load_config(&matches).unwrap_err();
        assert!(e.to_string().contains("min_update_interval_ms"));

        let matches = cli()
            .try_get_matches_from(["telepoll", "--config", "/nonexistent/telepoll.json", "me"])
            .unwrap();
        let e = load_config(&matches).unwrap_err();
        assert!(e.to_string().starts_with("Failed to open"));
    }
}
