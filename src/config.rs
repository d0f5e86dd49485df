use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, bail};

use crate::models::LogType;

/// Command line configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "log-comments", version, about)]
pub struct Args {
    /// Identity token of the person using the viewer. Without it no comment is editable.
    #[arg(long, env = "LOG_COMMENTS_USER")]
    pub user: Option<String>,

    /// Local comment store.
    #[arg(long, default_value = "tmp/comments.db")]
    pub database: PathBuf,

    /// Log-type context of the inspected log file.
    #[arg(long, value_enum, default_value_t = LogType::Webapp)]
    pub log_type: LogType,

    /// Destination of the diagnostic log.
    #[arg(long, default_value = "tmp/app.log")]
    pub log_file: PathBuf,

    #[arg(long, value_enum, default_value_t = Verbosity::Debug)]
    pub verbosity: Verbosity,

    /// Log file to inspect.
    #[arg(value_name = "LOG")]
    pub log: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Write a comment for a log line into the local store.
    Post {
        /// 1-based line number inside LOG.
        #[arg(long)]
        line: usize,
        /// Identity token of the author.
        #[arg(long)]
        author: String,
        /// Display name of the author.
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        avatar: String,
        text: String,
    },
    /// Print the comments of a log line as HTML cards.
    Html {
        /// 1-based line number inside LOG.
        #[arg(long)]
        line: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Verbosity {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Verbosity {
    pub fn level_filter(self) -> log::LevelFilter {
        match self {
            Verbosity::Error => log::LevelFilter::Error,
            Verbosity::Warn => log::LevelFilter::Warn,
            Verbosity::Info => log::LevelFilter::Info,
            Verbosity::Debug => log::LevelFilter::Debug,
            Verbosity::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Settings consumed by [`crate::logging::setup_logging`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub file: PathBuf,
    pub level: log::LevelFilter,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        if let Some(user) = &self.user
            && user.trim().is_empty()
        {
            bail!("--user must not be empty");
        }
        match &self.command {
            Some(Command::Post { text, line, .. }) => {
                if text.trim().is_empty() {
                    bail!("refusing to post an empty comment");
                }
                Self::validate_line(*line)?;
            }
            Some(Command::Html { line }) => Self::validate_line(*line)?,
            None => return Ok(()),
        }
        if self.log.is_none() {
            bail!("the command needs the LOG argument");
        }
        Ok(())
    }

    fn validate_line(line: usize) -> Result<()> {
        if line == 0 {
            bail!("--line is 1-based");
        }
        Ok(())
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            file: self.log_file.clone(),
            level: self.verbosity.level_filter(),
        }
    }
}
