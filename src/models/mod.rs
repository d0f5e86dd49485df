pub mod comment;
pub mod log_line;
pub mod session;

pub use comment::{Comment, CommentId};
pub use log_line::{LineId, LogLine, LogType};
pub use session::SessionState;
