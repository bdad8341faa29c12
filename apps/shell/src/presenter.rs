//! Terminal rendition of dialogs and notifications.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use boop_connection::{Dialog, Notification, Presenter};
use boop_notices::{NoticeBoard, NoticeKind, NoticeLevel};

/// Presenter backed by a shared [`NoticeBoard`].
///
/// Dialogs are printed and then wait until the user types `ack`.
#[derive(Clone, Default)]
pub struct TerminalPresenter {
    board: Arc<Mutex<NoticeBoard>>,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn board(&self) -> MutexGuard<'_, NoticeBoard> {
        self.board.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queues and prints a non-blocking notification.
    pub fn notify(&self, level: NoticeLevel, title: &str, body: &str) -> u64 {
        let id = self.board().push_notification(level, title, body);
        println!("[{}] {title}: {body}", level.label());
        id
    }

    /// Acknowledges the oldest open dialog.
    pub fn acknowledge_oldest(&self) -> Option<u64> {
        self.board().acknowledge_oldest()
    }

    /// Removes a notice; a dismissed dialog releases its waiter.
    pub fn dismiss(&self, id: u64) -> bool {
        self.board().dismiss(id)
    }

    pub fn open_dialogs(&self) -> usize {
        self.board().pending_dialogs().count()
    }

    /// One line per queued notice, oldest first.
    pub fn render_notices(&self) -> Vec<String> {
        self.board()
            .iter()
            .map(|n| {
                let kind = match n.kind {
                    NoticeKind::Dialog => "dialog",
                    NoticeKind::Notification => "note",
                };
                format!(
                    "#{} {} {} [{}] {}: {}",
                    n.id,
                    n.created_at.format("%H:%M:%S"),
                    kind,
                    n.level.label(),
                    n.title,
                    n.body
                )
            })
            .collect()
    }
}

impl Presenter for TerminalPresenter {
    async fn show_dialog(&self, dialog: Dialog) {
        let (id, ack) = self
            .board()
            .push_dialog(NoticeLevel::Error, &dialog.title, &dialog.text);
        println!(
            "\n*** {} ***\n{}\n(type `ack` to dismiss)",
            dialog.title, dialog.text
        );

        // A dropped board or a dismissal counts as acknowledged.
        let _ = ack.await;
        debug!(id, "dialog closed");
    }

    fn send_notification(&self, notification: Notification) {
        self.notify(NoticeLevel::Error, &notification.title, &notification.body);
    }
}
