//! Single-slot error state shared by every bridge operation

/// Holds the most recent error message. An empty message means no error.
#[derive(Debug, Default, Clone)]
pub struct ErrorLatch {
    message: String,
}

impl ErrorLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites any unread error.
    pub fn set(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub fn clear(&mut self) {
        self.message.clear();
    }

    pub fn occurred(&self) -> bool {
        !self.message.is_empty()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Consuming read: returns the message and leaves the latch empty.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.message)
    }
}
