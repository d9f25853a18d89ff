//! [`LiveChannel`] over a WebSocket chat session.

use agora_client::{ChatSession, Notice};

use crate::LiveChannel;

impl LiveChannel for ChatSession {
    fn try_send(&mut self, body: &str) -> impl Future<Output = bool> + Send {
        self.send(body)
    }

    fn start_typing(&mut self) {
        ChatSession::start_typing(self);
    }

    fn stop_typing(&mut self) {
        ChatSession::stop_typing(self);
    }

    fn mark_read(&mut self, message_id: u64) {
        ChatSession::mark_read(self, message_id);
    }

    fn poll_notice(&mut self) -> Option<Notice> {
        self.try_notice()
    }

    async fn teardown(&mut self) {
        ChatSession::teardown(self).await;
    }
}
