//! Synchronous observer list.

/// Callback registered with a [`Subject`].
pub type Listener<E> = Box<dyn FnMut(&E) + Send>;

/// Handle returned by [`Subject::attach`]; give it back to detach.
#[derive(Debug, PartialEq, Eq)]
pub struct ListenerToken(u64);

/// Ordered set of listeners notified synchronously, in attachment order.
pub struct Subject<E> {
    next: u64,
    listeners: Vec<(u64, Listener<E>)>,
}

impl<E> Default for Subject<E> {
    fn default() -> Self {
        Self {
            next: 0,
            listeners: Vec::new(),
        }
    }
}

impl<E> Subject<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, listener: impl FnMut(&E) + Send + 'static) -> ListenerToken {
        let id = self.next;
        self.next += 1;
        self.listeners.push((id, Box::new(listener)));
        ListenerToken(id)
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn detach(&mut self, token: ListenerToken) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(id, _)| *id != token.0);
        self.listeners.len() != before
    }

    pub fn notify_all(&mut self, event: &E) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<E> std::fmt::Debug for Subject<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
