use chrono::{DateTime, Local};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

/// Handle for addressing a message after insertion. Mutation always goes
/// through an id rather than a position in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(usize);

#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    pub text: String,
    pub is_generating: bool,
    pub timestamp: DateTime<Local>,
}

/// Append-only ordered sequence of chat messages; the single source of truth
/// for what is rendered. Messages are never removed or reordered.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    fn push(&mut self, sender: Sender, text: String, is_generating: bool) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(Message {
            id,
            sender,
            text,
            is_generating,
            timestamp: Local::now(),
        });
        id
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> MessageId {
        self.push(Sender::User, text.into(), false)
    }

    /// Appends a finalized assistant message, e.g. the greeting or an error
    /// bubble. Never touches any in-progress placeholder.
    pub fn push_assistant(&mut self, text: impl Into<String>) -> MessageId {
        self.push(Sender::Assistant, text.into(), false)
    }

    /// Appends an empty generating placeholder for the assistant turn that is
    /// about to stream.
    ///
    /// A placeholder abandoned by a failed turn keeps its partial text but is
    /// demoted here, so at most one message is generating at any time.
    pub fn begin_assistant(&mut self) -> MessageId {
        for message in &mut self.messages {
            message.is_generating = false;
        }
        self.push(Sender::Assistant, String::new(), true)
    }

    /// Concatenates a streamed fragment onto the addressed message. Returns
    /// false without mutating anything when the message is missing or already
    /// finalized.
    pub fn append_chunk(&mut self, id: MessageId, fragment: &str) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) if message.is_generating => {
                message.text.push_str(fragment);
                true
            }
            _ => false,
        }
    }

    /// Marks the addressed message complete. Its text is immutable from here
    /// on. Returns false when the message is missing or already finalized.
    pub fn finalize(&mut self, id: MessageId) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) if message.is_generating => {
                message.is_generating = false;
                true
            }
            _ => false,
        }
    }

    pub fn generating_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_generating).count()
    }
}
