use tokio::sync::oneshot;

/// Why a [`ResultStream`] stopped accepting new values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Every job in the owning set produced a result.
    Completed,
    /// The owning set was cancelled before every job produced a result.
    Cancelled,
}

/// The outcome of asking a [`ResultStream`] for the value at a given index.
#[derive(Debug, Clone)]
pub enum NextOutcome<T> {
    /// The value at the requested index, already available.
    Value(T),
    /// The stream ended (see the carried reason) before this index was filled.
    End(StreamEnd),
}

/// An append-only, replayable history of job results.
///
/// Exactly one `ResultStream` backs a job set. Multiple independent
/// consumers can each read from index 0 without disturbing one another,
/// since reading never removes a value — a consumer is just a cursor the
/// owner of the stream keeps on its behalf.
///
/// Lives inside the dispatch actor's task; nothing here is `Send`-gated
/// beyond what `oneshot::Sender` already requires, since the stream is
/// never shared across tasks directly.
pub struct ResultStream<T> {
    history: Vec<T>,
    end: Option<StreamEnd>,
    waiters: Vec<(usize, oneshot::Sender<NextOutcome<T>>)>,
}

impl<T: Clone> ResultStream<T> {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            end: None,
            waiters: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_ended(&self) -> bool {
        self.end.is_some()
    }

    /// Append a value and wake any waiter whose index is now satisfied.
    ///
    /// No-op after the stream has ended; a caller that already checked
    /// `is_ended` before dispatching more work will never hit this path.
    pub fn push(&mut self, value: T) {
        if self.end.is_some() {
            return;
        }
        self.history.push(value);
        self.wake_ready();
    }

    /// End the stream for the given reason and resolve every still-parked waiter.
    pub fn close(&mut self, reason: StreamEnd) {
        if self.end.is_some() {
            return;
        }
        self.end = Some(reason);
        self.wake_ready();
    }

    /// Resolve immediately if `index` is already available or the stream has
    /// ended; otherwise park `reply` until one becomes true.
    pub fn poll_or_wait(&mut self, index: usize, reply: oneshot::Sender<NextOutcome<T>>) {
        match self.peek(index) {
            Some(outcome) => {
                let _ = reply.send(outcome);
            }
            None => self.waiters.push((index, reply)),
        }
    }

    fn peek(&self, index: usize) -> Option<NextOutcome<T>> {
        if let Some(value) = self.history.get(index) {
            return Some(NextOutcome::Value(value.clone()));
        }
        self.end.map(NextOutcome::End)
    }

    fn wake_ready(&mut self) {
        let mut still_waiting = Vec::with_capacity(self.waiters.len());
        for (index, reply) in self.waiters.drain(..) {
            match self.peek(index) {
                Some(outcome) => {
                    let _ = reply.send(outcome);
                }
                None => still_waiting.push((index, reply)),
            }
        }
        self.waiters = still_waiting;
    }
}
