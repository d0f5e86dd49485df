use crate::config::LoggingConfig;

/// Log target used by the comment edit controller and the markup pipeline.
pub const COMMENT_TARGET: &str = "comment";

pub fn setup_logging(config: &LoggingConfig) {
    tui_logger::init_logger(tui_logger::LevelFilter::Trace).unwrap();

    // Create the log directory if it does not exist
    if let Some(dir) = config.file.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).unwrap_or_else(|_| {
            eprintln!("Failed to create {}, logging will not work properly.", dir.display());
        });
    }
    let file_config = tui_logger::TuiLoggerFile::new(&config.file.to_string_lossy());
    tui_logger::set_log_file(file_config);

    tui_logger::set_default_level(config.level);
}
