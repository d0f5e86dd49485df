use std::sync::atomic::{AtomicU64, Ordering};

use color_eyre::eyre::WrapErr;

use crate::{
    logging::COMMENT_TARGET,
    models::{Comment, CommentId, LineId, LogLine, LogType},
    services::{CommentService, ServiceResponse},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditMode {
    #[default]
    Viewing,
    Editing,
}

/// Local view state of one mounted comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub mode: EditMode,
    pub draft_text: String,
    /// True only while a submit request is outstanding.
    pub is_submitting: bool,
}

impl EditSession {
    fn viewing(text: &str) -> Self {
        Self {
            mode: EditMode::Viewing,
            draft_text: text.to_string(),
            is_submitting: false,
        }
    }
}

/// Session tokens are unique per process so a ticket can never match another view's session.
fn next_session_id() -> u64 {
    static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(0);
    NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Permission to edit the currently bound comment.
///
/// Only handed out by [`CommentEditController::edit_affordance`] when the viewer authored the
/// comment, and only valid until the controller is bound to another comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditAffordance {
    session_id: u64,
}

/// Identifies one submit request and the session it was issued from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTicket {
    pub comment_id: CommentId,
    session_id: u64,
    submission_id: u64,
}

/// Everything needed to call the comment service for one submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub ticket: SubmitTicket,
    pub line_id: LineId,
    pub comment_id: CommentId,
    pub text: String,
    pub log_type: LogType,
}

impl SubmitRequest {
    pub async fn dispatch(
        &self,
        service: &dyn CommentService,
    ) -> color_eyre::Result<ServiceResponse> {
        service
            .update_comment(&self.line_id, &self.comment_id, &self.text, self.log_type)
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The update was stored, the session is back in view mode and the parent was notified.
    Posted,
    /// A precondition did not hold; nothing was sent.
    Ignored,
    /// The resolution belonged to a session that no longer exists and was dropped.
    Stale,
}

/// Owns the edit session of a mounted comment and mediates its submits.
pub struct CommentEditController {
    comment: Comment,
    viewer_identity: Option<String>,
    session: EditSession,
    /// Bumped whenever the controller is bound to a different comment.
    session_id: u64,
    next_submission_id: u64,
    pending: Option<SubmitTicket>,
    did_post: Box<dyn FnMut()>,
}

impl std::fmt::Debug for CommentEditController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommentEditController")
            .field("comment_id", &self.comment.id)
            .field("session", &self.session)
            .field("session_id", &self.session_id)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl CommentEditController {
    /// Start a session for a freshly mounted comment view.
    ///
    /// `did_post` runs exactly once per successful submit.
    pub fn mount(
        comment: Comment,
        viewer_identity: Option<String>,
        did_post: impl FnMut() + 'static,
    ) -> Self {
        log::trace!(target: COMMENT_TARGET, "Mounted comment {}", comment.id);
        Self {
            session: EditSession::viewing(&comment.text),
            comment,
            viewer_identity,
            session_id: next_session_id(),
            next_submission_id: 0,
            pending: None,
            did_post: Box::new(did_post),
        }
    }

    /// End the session. Resolutions still in flight for it have nowhere to land.
    pub fn unmount(self) {
        if let Some(ticket) = &self.pending {
            log::debug!(
                target: COMMENT_TARGET,
                "Unmounted comment {} with a submit in flight",
                ticket.comment_id
            );
        }
    }

    pub fn comment(&self) -> &Comment {
        &self.comment
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn mode(&self) -> EditMode {
        self.session.mode
    }

    pub fn draft_text(&self) -> &str {
        &self.session.draft_text
    }

    pub fn is_submitting(&self) -> bool {
        self.session.is_submitting
    }

    /// Whether `ticket` is the submit this session is waiting on.
    pub fn is_awaiting(&self, ticket: &SubmitTicket) -> bool {
        self.pending.as_ref() == Some(ticket)
    }

    pub fn edit_affordance(&self) -> Option<EditAffordance> {
        self.comment
            .is_authored_by(self.viewer_identity.as_deref())
            .then_some(EditAffordance {
                session_id: self.session_id,
            })
    }

    /// Switch to edit mode with the draft seeded from the comment. Returns whether it switched.
    pub fn enter_edit(&mut self, affordance: EditAffordance) -> bool {
        if affordance.session_id != self.session_id {
            log::debug!(target: COMMENT_TARGET, "Ignoring edit affordance of a previous comment");
            return false;
        }
        if self.session.mode == EditMode::Editing {
            return false;
        }
        self.session.mode = EditMode::Editing;
        self.session.draft_text = self.comment.text.clone();
        true
    }

    pub fn toggle_edit(&mut self, affordance: EditAffordance) {
        match self.session.mode {
            EditMode::Viewing => {
                self.enter_edit(affordance);
            }
            EditMode::Editing => self.cancel_edit(),
        }
    }

    /// Leave edit mode without saving. The draft is reseeded from the comment.
    pub fn cancel_edit(&mut self) {
        if self.session.mode == EditMode::Editing {
            self.session.mode = EditMode::Viewing;
            self.session.draft_text = self.comment.text.clone();
        }
    }

    pub fn update_draft(&mut self, text: impl Into<String>) {
        self.session.draft_text = text.into();
    }

    /// Label of the submit control. An empty draft deletes the comment.
    pub fn submit_label(&self) -> &'static str {
        if self.session.draft_text.is_empty() {
            "Delete"
        } else {
            "Save"
        }
    }

    /// Mark the session as submitting and describe the service call to make.
    ///
    /// Returns `None`, leaving the session untouched, while another submit is outstanding, when
    /// there is no draft being edited, or when the target line is unknown.
    pub fn begin_submit(&mut self, selected_line: Option<&LogLine>) -> Option<SubmitRequest> {
        if self.session.is_submitting {
            log::debug!(target: COMMENT_TARGET, "Submit already in flight for {}", self.comment.id);
            return None;
        }
        if self.session.mode != EditMode::Editing {
            log::debug!(target: COMMENT_TARGET, "No draft to submit for {}", self.comment.id);
            return None;
        }
        let Some(selected_line) = selected_line else {
            log::debug!(target: COMMENT_TARGET, "No selected log line, not submitting");
            return None;
        };
        let Some(line_id) = self.comment.line_id.clone() else {
            log::debug!(target: COMMENT_TARGET, "Comment {} has no line, not submitting", self.comment.id);
            return None;
        };

        let ticket = SubmitTicket {
            comment_id: self.comment.id.clone(),
            session_id: self.session_id,
            submission_id: self.next_submission_id,
        };
        self.next_submission_id += 1;
        self.pending = Some(ticket.clone());
        self.session.is_submitting = true;

        Some(SubmitRequest {
            ticket,
            line_id,
            comment_id: self.comment.id.clone(),
            text: self.session.draft_text.clone(),
            log_type: selected_line.log_type,
        })
    }

    /// Apply the resolution of a submit started with [`Self::begin_submit`].
    ///
    /// A resolution whose ticket is not the outstanding one is discarded. A service failure
    /// clears the submitting flag, keeps the draft and is returned as the error.
    pub fn finish_submit(
        &mut self,
        ticket: &SubmitTicket,
        result: color_eyre::Result<ServiceResponse>,
    ) -> color_eyre::Result<SubmitOutcome> {
        if !self.is_awaiting(ticket) {
            log::warn!(
                target: COMMENT_TARGET,
                "Discarding stale submit resolution for comment {}",
                ticket.comment_id
            );
            return Ok(SubmitOutcome::Stale);
        }

        self.pending = None;
        self.session.is_submitting = false;
        let response = result
            .wrap_err_with(|| format!("Failed to update comment {}", ticket.comment_id))?;

        log::debug!(
            target: COMMENT_TARGET,
            "Posted comment {} ({}): {}",
            ticket.comment_id,
            response.status,
            response.body
        );
        self.session.mode = EditMode::Viewing;
        self.session.draft_text.clear();
        (self.did_post)();
        Ok(SubmitOutcome::Posted)
    }

    /// Submit the draft and wait for the service in one step.
    pub async fn submit(
        &mut self,
        service: &dyn CommentService,
        selected_line: Option<&LogLine>,
    ) -> color_eyre::Result<SubmitOutcome> {
        let Some(request) = self.begin_submit(selected_line) else {
            return Ok(SubmitOutcome::Ignored);
        };
        let result = request.dispatch(service).await;
        self.finish_submit(&request.ticket, result)
    }

    /// Bind the controller to the comment the parent now supplies.
    ///
    /// A new revision of the same comment keeps the session; a different comment resets it.
    pub fn rebind(&mut self, comment: Comment) {
        if comment.id == self.comment.id {
            self.comment = comment;
        } else {
            self.reset_on_identity_change(comment);
        }
    }

    /// Drop all session state and show `comment` in view mode.
    pub fn reset_on_identity_change(&mut self, comment: Comment) {
        if let Some(ticket) = self.pending.take() {
            log::debug!(
                target: COMMENT_TARGET,
                "Abandoning submit for {} after switching to {}",
                ticket.comment_id,
                comment.id
            );
        }
        self.session_id = next_session_id();
        self.session = EditSession::viewing(&comment.text);
        self.comment = comment;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::test_utils::{ScriptedCommentService, test_line};
    use color_eyre::eyre::eyre;

    fn ok_response() -> color_eyre::Result<ServiceResponse> {
        Ok(ServiceResponse {
            status: 200,
            body: "ok".to_string(),
        })
    }

    fn controller_for(
        comment: Comment,
        viewer: Option<&str>,
    ) -> (CommentEditController, Rc<Cell<usize>>) {
        let posted = Rc::new(Cell::new(0));
        let counter = Rc::clone(&posted);
        let controller = CommentEditController::mount(comment, viewer.map(str::to_string), move || {
            counter.set(counter.get() + 1)
        });
        (controller, posted)
    }

    fn editing_controller() -> (CommentEditController, Rc<Cell<usize>>) {
        let (mut controller, posted) =
            controller_for(Comment::test_comment("c1", Some("alice"), "hello world"), Some("alice"));
        let affordance = controller.edit_affordance().unwrap();
        assert!(controller.enter_edit(affordance));
        (controller, posted)
    }

    #[test]
    fn test_mount_starts_in_view_mode() {
        let (controller, _) =
            controller_for(Comment::test_comment("c1", Some("alice"), "hello"), Some("alice"));

        assert_eq!(
            controller.session(),
            &EditSession {
                mode: EditMode::Viewing,
                draft_text: "hello".to_string(),
                is_submitting: false,
            }
        );
    }

    #[test]
    fn test_edit_affordance_requires_authorship() {
        let comment = Comment::test_comment("c1", Some("alice"), "hello");

        let (as_author, _) = controller_for(comment.clone(), Some("alice"));
        assert!(as_author.edit_affordance().is_some());

        let (as_other, _) = controller_for(comment.clone(), Some("bob"));
        assert!(as_other.edit_affordance().is_none());

        let (as_anonymous, _) = controller_for(comment, None);
        assert!(as_anonymous.edit_affordance().is_none());

        let (unowned, _) = controller_for(Comment::test_comment("c2", None, "x"), None);
        assert!(unowned.edit_affordance().is_none());
    }

    #[tokio::test]
    async fn test_edit_to_delete_scenario() {
        let service = ScriptedCommentService::new();
        service.push_update_result(ok_response());
        let line = test_line();

        let (mut controller, posted) = controller_for(
            Comment::test_comment("c1", Some("alice"), "hello world"),
            Some("alice"),
        );
        let affordance = controller.edit_affordance().unwrap();
        controller.enter_edit(affordance);
        assert_eq!(controller.draft_text(), "hello world");
        assert_eq!(controller.submit_label(), "Save");

        controller.update_draft("");
        assert_eq!(controller.submit_label(), "Delete");

        let outcome = controller.submit(&service, Some(&line)).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Posted);
        assert_eq!(controller.mode(), EditMode::Viewing);
        assert_eq!(controller.draft_text(), "");
        assert!(!controller.is_submitting());
        assert_eq!(posted.get(), 1);

        let calls = service.update_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].line_id, "app.log:1");
        assert_eq!(calls[0].comment_id, "c1");
        assert_eq!(calls[0].text, "");
        assert_eq!(calls[0].log_type, LogType::Webapp);
    }

    #[test]
    fn test_update_draft_is_last_write_wins() {
        let (mut controller, _) = editing_controller();

        for draft in ["a", "ab", "", "final"] {
            controller.update_draft(draft);
        }

        assert_eq!(controller.draft_text(), "final");
        assert_eq!(controller.mode(), EditMode::Editing);
    }

    #[test]
    fn test_second_submit_while_outstanding_is_refused() {
        let (mut controller, _) = editing_controller();
        let line = test_line();

        let first = controller.begin_submit(Some(&line));
        assert!(first.is_some());
        assert!(controller.is_submitting());

        assert_eq!(controller.begin_submit(Some(&line)), None);
        assert!(controller.is_submitting());
    }

    #[tokio::test]
    async fn test_submit_while_outstanding_issues_no_service_call() {
        let service = ScriptedCommentService::new();
        let (mut controller, _) = editing_controller();
        let line = test_line();
        let _in_flight = controller.begin_submit(Some(&line)).unwrap();

        let outcome = controller.submit(&service, Some(&line)).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Ignored);
        assert!(service.update_calls().is_empty());
    }

    #[test]
    fn test_submit_preconditions() {
        let line = test_line();

        let (mut viewing, _) =
            controller_for(Comment::test_comment("c1", Some("alice"), "hi"), Some("alice"));
        assert_eq!(viewing.begin_submit(Some(&line)), None);

        let (mut no_line, _) = editing_controller();
        assert_eq!(no_line.begin_submit(None), None);
        assert!(!no_line.is_submitting());

        let mut detached = Comment::test_comment("c1", Some("alice"), "hi");
        detached.line_id = None;
        let (mut detached, _) = controller_for(detached, Some("alice"));
        let affordance = detached.edit_affordance().unwrap();
        detached.enter_edit(affordance);
        assert_eq!(detached.begin_submit(Some(&line)), None);
        assert!(!detached.is_submitting());
    }

    #[test]
    fn test_service_failure_clears_submitting_and_propagates() {
        let (mut controller, posted) = editing_controller();
        controller.update_draft("edited");
        let line = test_line();
        let request = controller.begin_submit(Some(&line)).unwrap();

        let error = controller
            .finish_submit(&request.ticket, Err(eyre!("service unavailable")))
            .unwrap_err();

        assert!(format!("{error:#}").contains("service unavailable"));
        assert!(!controller.is_submitting());
        assert_eq!(controller.mode(), EditMode::Editing);
        assert_eq!(controller.draft_text(), "edited");
        assert_eq!(posted.get(), 0);

        // A manual retry is possible again.
        assert!(controller.begin_submit(Some(&line)).is_some());
    }

    #[test]
    fn test_switching_comment_mid_submit_resets_and_ignores_late_resolution() {
        let (mut controller, posted) = editing_controller();
        controller.update_draft("edited");
        let line = test_line();
        let request = controller.begin_submit(Some(&line)).unwrap();

        controller.rebind(Comment::test_comment("c2", Some("bob"), "other text"));

        let expected = EditSession {
            mode: EditMode::Viewing,
            draft_text: "other text".to_string(),
            is_submitting: false,
        };
        assert_eq!(controller.session(), &expected);

        let outcome = controller
            .finish_submit(&request.ticket, ok_response())
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Stale);
        assert_eq!(controller.session(), &expected);
        assert_eq!(posted.get(), 0);
    }

    #[test]
    fn test_resolution_is_keyed_by_session_not_comment_id() {
        let (mut controller, posted) = editing_controller();
        let line = test_line();
        let request = controller.begin_submit(Some(&line)).unwrap();

        controller.rebind(Comment::test_comment("c2", Some("alice"), "other"));
        controller.rebind(Comment::test_comment("c1", Some("alice"), "hello world"));
        let affordance = controller.edit_affordance().unwrap();
        controller.enter_edit(affordance);

        let outcome = controller
            .finish_submit(&request.ticket, ok_response())
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Stale);
        assert_eq!(controller.mode(), EditMode::Editing);
        assert_eq!(posted.get(), 0);
    }

    #[test]
    fn test_rebinding_same_comment_keeps_session() {
        let (mut controller, _) = editing_controller();
        controller.update_draft("work in progress");

        let mut revision = Comment::test_comment("c1", Some("alice"), "hello world, edited elsewhere");
        revision.timestamp += 1000;
        controller.rebind(revision.clone());

        assert_eq!(controller.mode(), EditMode::Editing);
        assert_eq!(controller.draft_text(), "work in progress");
        assert_eq!(controller.comment(), &revision);
    }

    #[test]
    fn test_cancel_reseeds_draft_from_comment() {
        let (mut controller, _) = editing_controller();
        controller.update_draft("throwaway");

        controller.cancel_edit();

        assert_eq!(controller.mode(), EditMode::Viewing);
        assert_eq!(controller.draft_text(), "hello world");
    }

    #[test]
    fn test_toggle_edit_round_trip() {
        let (mut controller, _) =
            controller_for(Comment::test_comment("c1", Some("alice"), "hi"), Some("alice"));
        let affordance = controller.edit_affordance().unwrap();

        controller.toggle_edit(affordance);
        assert_eq!(controller.mode(), EditMode::Editing);
        controller.update_draft("changed");

        controller.toggle_edit(affordance);
        assert_eq!(controller.mode(), EditMode::Viewing);
        assert_eq!(controller.draft_text(), "hi");
    }

    #[test]
    fn test_affordance_of_previous_comment_is_rejected() {
        let (mut controller, _) =
            controller_for(Comment::test_comment("c1", Some("alice"), "hi"), Some("alice"));
        let stale = controller.edit_affordance().unwrap();

        controller.rebind(Comment::test_comment("c2", Some("alice"), "mine too"));

        assert!(!controller.enter_edit(stale));
        assert_eq!(controller.mode(), EditMode::Viewing);
    }

    #[test]
    fn test_tickets_of_other_controllers_do_not_match() {
        let (mut first, _) = editing_controller();
        let (mut second, posted) = editing_controller();
        let line = test_line();
        let first_request = first.begin_submit(Some(&line)).unwrap();
        let second_request = second.begin_submit(Some(&line)).unwrap();

        assert!(!second.is_awaiting(&first_request.ticket));
        assert!(second.is_awaiting(&second_request.ticket));
        let outcome = second
            .finish_submit(&first_request.ticket, ok_response())
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Stale);
        assert!(second.is_submitting());
        assert_eq!(posted.get(), 0);
    }

    #[test]
    fn test_success_after_cancel_still_notifies_parent() {
        let (mut controller, posted) = editing_controller();
        let line = test_line();
        let request = controller.begin_submit(Some(&line)).unwrap();

        controller.cancel_edit();
        let outcome = controller
            .finish_submit(&request.ticket, ok_response())
            .unwrap();

        assert_eq!(outcome, SubmitOutcome::Posted);
        assert_eq!(controller.mode(), EditMode::Viewing);
        assert!(!controller.is_submitting());
        assert_eq!(posted.get(), 1);
    }
}
