use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use color_eyre::eyre::eyre;

use crate::app::App;
use crate::config::{Args, Command};
use crate::controller::CommentEditController;
use crate::database::Database;
use crate::models::{Comment, LogLine, SessionState};
use crate::services::{CommentService, SqliteCommentService};
use crate::views::CommentCard;

pub mod app;
pub mod config;
pub mod controller;
pub mod database;
pub mod event;
pub mod event_handler;
pub mod logging;
pub mod markup;
pub mod models;
pub mod services;
pub mod test_utils;
pub mod ui;
pub mod views;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    let args = Args::parse();
    args.validate()?;

    crate::logging::setup_logging(&args.logging());
    log::info!("Starting application");

    color_eyre::install()?;
    let database = Database::new(&args.database).await?;
    let service = SqliteCommentService::new(database);

    let log_lines = match &args.log {
        Some(path) => LogLine::read_file(path, args.log_type)?,
        None => Vec::new(),
    };

    match &args.command {
        Some(Command::Post {
            line,
            author,
            name,
            avatar,
            text,
        }) => {
            let line = find_line(&log_lines, *line)?;
            let comment = Comment::new(&line.id, line.log_type, author, name, avatar, text);
            service.post_comment(&comment).await?;
            println!("{}", comment.id);
            Ok(())
        }
        Some(Command::Html { line }) => {
            let line = find_line(&log_lines, *line)?;
            print_thread_html(&service, line, args.user.clone()).await
        }
        None => {
            let session = SessionState::new(args.user.clone());
            let terminal = ratatui::init();
            let result = App::new(Arc::new(service), session, log_lines)
                .run(terminal)
                .await;
            ratatui::restore();
            result
        }
    }
}

fn find_line(log_lines: &[LogLine], number: usize) -> color_eyre::Result<&LogLine> {
    log_lines
        .iter()
        .find(|line| line.number == number)
        .ok_or_else(|| eyre!("the log has no line {number}"))
}

/// Print the read-mode cards of a line's comments as the viewer would see them.
async fn print_thread_html(
    service: &SqliteCommentService,
    line: &LogLine,
    viewer_identity: Option<String>,
) -> color_eyre::Result<()> {
    let comments = service.list_comments(&line.id).await?;
    log::debug!("Rendering {} comments of {}", comments.len(), line.id);

    for comment in comments {
        let controller = CommentEditController::mount(comment, viewer_identity.clone(), || {});
        println!("{}", CommentCard::from_controller(&controller, &Local).to_html());
        controller.unmount();
    }
    Ok(())
}
