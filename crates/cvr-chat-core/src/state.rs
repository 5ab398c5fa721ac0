//! UI-agnostic transcript state
//!
//! The transcript is the ordered list of entries a chat view renders. It is
//! append-only apart from [`Transcript::clear_and_seed`], and it holds at most
//! one loading placeholder at a time.

/// Text shown by the loading placeholder while a reply is pending.
pub const LOADING_TEXT: &str = "Thinking...";

/// Opaque identifier of a transcript entry, unique for the transcript's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u64);

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Bot,
    BotError,
}

impl Role {
    /// Style class used by renderers to pick the visual treatment.
    pub fn class_name(&self) -> &'static str {
        match self {
            Role::User => "user-msg",
            Role::Bot => "bot-msg",
            Role::BotError => "bot-msg error",
        }
    }
}

/// A chat message in the transcript. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: EntryId,
    role: Role,
    text: String,
}

impl Message {
    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Transient entry shown while a `/chat` request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadingPlaceholder {
    id: EntryId,
}

impl LoadingPlaceholder {
    pub const CLASS_NAME: &'static str = "bot-msg loading";

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn text(&self) -> &'static str {
        LOADING_TEXT
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Message(Message),
    Loading(LoadingPlaceholder),
}

impl Entry {
    pub fn id(&self) -> EntryId {
        match self {
            Entry::Message(msg) => msg.id(),
            Entry::Loading(placeholder) => placeholder.id(),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Entry::Message(msg) => msg.text(),
            Entry::Loading(placeholder) => placeholder.text(),
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            Entry::Message(msg) => msg.role().class_name(),
            Entry::Loading(_) => LoadingPlaceholder::CLASS_NAME,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Entry::Message(msg) => Some(msg),
            Entry::Loading(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
    placeholder: Option<EntryId>,
    next_id: u64,
    revision: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transcript seeded with a single bot greeting.
    pub fn with_greeting(greeting: &str) -> Self {
        let mut transcript = Self::new();
        transcript.push(Role::Bot, greeting);
        transcript
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(Entry::as_message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bumped on every mutation. Views compare it to decide when to follow the tail.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn active_placeholder(&self) -> Option<EntryId> {
        self.placeholder
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) -> EntryId {
        let id = self.allocate_id();
        self.entries.push(Entry::Message(Message {
            id,
            role,
            text: text.into(),
        }));
        self.revision += 1;
        id
    }

    /// Appends the loading placeholder. Returns `None` if one is already shown.
    pub fn show_placeholder(&mut self) -> Option<EntryId> {
        if self.placeholder.is_some() {
            return None;
        }
        let id = self.allocate_id();
        self.entries.push(Entry::Loading(LoadingPlaceholder { id }));
        self.placeholder = Some(id);
        self.revision += 1;
        Some(id)
    }

    /// Removes the placeholder if `id` is the active one.
    pub fn remove_placeholder(&mut self, id: EntryId) -> bool {
        if self.placeholder != Some(id) {
            return false;
        }
        self.entries.retain(|entry| entry.id() != id);
        self.placeholder = None;
        self.revision += 1;
        true
    }

    /// Drops every entry and re-seeds with one bot greeting.
    pub fn clear_and_seed(&mut self, greeting: &str) {
        self.entries.clear();
        self.placeholder = None;
        self.push(Role::Bot, greeting);
    }

    fn allocate_id(&mut self) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        id
    }
}
