use std::path::Path;

use clap::ValueEnum;
use color_eyre::eyre::WrapErr;

pub type LineId = String;

/// Kind of log a line was read from. Comments are scoped by it on the comment service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum LogType {
    Browser,
    Webapp,
    Mobile,
    Installer,
    Call,
}

impl LogType {
    pub fn as_str(self) -> &'static str {
        match self {
            LogType::Browser => "browser",
            LogType::Webapp => "webapp",
            LogType::Mobile => "mobile",
            LogType::Installer => "installer",
            LogType::Call => "call",
        }
    }
}

impl std::fmt::Display for LogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub id: LineId,
    /// 1-based line number in the source file.
    pub number: usize,
    pub text: String,
    pub log_type: LogType,
}

impl LogLine {
    /// Identifier of line `number` of the file `file_name`.
    pub fn line_id(file_name: &str, number: usize) -> LineId {
        format!("{file_name}:{number}")
    }

    pub fn parse(file_name: &str, content: &str, log_type: LogType) -> Vec<LogLine> {
        content
            .lines()
            .enumerate()
            .map(|(index, text)| LogLine {
                id: Self::line_id(file_name, index + 1),
                number: index + 1,
                text: text.to_string(),
                log_type,
            })
            .collect()
    }

    pub fn read_file(path: &Path, log_type: LogType) -> color_eyre::Result<Vec<LogLine>> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read log file {}", path.display()))?;
        Ok(Self::parse(&Self::file_name(path), &content, log_type))
    }

    pub fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string())
    }
}
