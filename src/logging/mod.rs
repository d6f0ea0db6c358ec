use std::{io::Write as _, os::fd::AsFd as _};

use anstyle::{AnsiColor, Effects, Style};
use env_logger::{Env, fmt::Formatter};
use log::{Level, Record};

pub fn init() {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if stderr_is_journal() {
        builder.format(journal_format);
    } else {
        builder.format(terminal_format);
    }
    builder.init();
}

/// Whether stderr is the stream systemd set up for us, as announced in
/// `$JOURNAL_STREAM` as `device:inode`.
fn stderr_is_journal() -> bool {
    let Some(journal_stream) = std::env::var_os("JOURNAL_STREAM") else {
        return false;
    };
    rustix::fs::fstat(std::io::stderr().as_fd()).is_ok_and(|stat| {
        journal_stream.to_string_lossy() == format!("{}:{}", stat.st_dev, stat.st_ino)
    })
}

/// syslog(3) priority for a log level.
fn priority(level: Level) -> u8 {
    match level {
        Level::Error => 3,
        Level::Warn => 4,
        Level::Info => 6,
        Level::Debug | Level::Trace => 7,
    }
}

fn journal_format(buf: &mut Formatter, record: &Record<'_>) -> std::io::Result<()> {
    writeln!(
        buf,
        "<{}>{}: {}",
        priority(record.level()),
        record.target(),
        record.args()
    )
}

fn level_style(level: Level) -> Style {
    match level {
        Level::Error => AnsiColor::Red.on_default().effects(Effects::BOLD),
        Level::Warn => AnsiColor::Yellow.on_default(),
        Level::Info => AnsiColor::Green.on_default(),
        Level::Debug => AnsiColor::Blue.on_default(),
        Level::Trace => AnsiColor::Cyan.on_default(),
    }
}

fn terminal_format(buf: &mut Formatter, record: &Record<'_>) -> std::io::Result<()> {
    let subtle = AnsiColor::BrightBlack.on_default();
    let level = level_style(record.level());
    write!(buf, "{subtle}[{subtle:#}{:.3} ", jiff::Timestamp::now())?;
    write!(buf, "{level}{}{level:#} {}", record.level(), record.target())?;
    if let Some(line) = record.line() {
        write!(buf, ":{line}")?;
    }
    writeln!(buf, "{subtle}]{subtle:#} {}", record.args())
}
