//! Session bookkeeping: who is in which room and what is on screen.

/// Server-local identifier handed out per accepted connection.
pub type ClientId = u64;

/// One named session. Members are kept in join order; broadcasts walk
/// this list so every viewer sees events in the same sequence.
#[derive(Debug)]
pub struct Session {
    password: String,
    members: Vec<ClientId>,
    share: Option<(u16, u16)>,
}

impl Session {
    pub fn new(password: &str) -> Self {
        Self {
            password: password.to_string(),
            members: Vec::new(),
            share: None,
        }
    }

    /// An empty stored password means the session is open: any attempt
    /// is accepted, including a non-empty one.
    pub fn password_matches(&self, attempt: &str) -> bool {
        self.password.is_empty() || self.password == attempt
    }

    pub fn join(&mut self, id: ClientId) {
        if !self.members.contains(&id) {
            self.members.push(id);
        }
    }

    /// Remove `id`; returns whether it was a member.
    pub fn leave(&mut self, id: ClientId) -> bool {
        let before = self.members.len();
        self.members.retain(|member| *member != id);
        self.members.len() != before
    }

    pub fn members(&self) -> &[ClientId] {
        &self.members
    }

    /// Every member except `id`, in join order.
    pub fn others(&self, id: ClientId) -> impl Iterator<Item = ClientId> + '_ {
        self.members
            .iter()
            .copied()
            .filter(move |member| *member != id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Record the screen geometry announced by a sharing member. It is
    /// replayed to anyone who joins later so their canvas has a size.
    pub fn set_share(&mut self, width: u16, height: u16) {
        self.share = Some((width, height));
    }

    pub fn share(&self) -> Option<(u16, u16)> {
        self.share
    }
}
