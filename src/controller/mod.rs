pub mod comment_edit;

pub use comment_edit::{
    CommentEditController, EditAffordance, EditMode, EditSession, SubmitOutcome, SubmitRequest,
    SubmitTicket,
};
