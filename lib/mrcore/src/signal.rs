use parking_lot::{Condvar, Mutex};

/// How a [`CountingSignal::wait`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// One posted unit was consumed.
    Posted,
    /// The signal was closed with no units left; the upstream worker died.
    Closed,
}

#[derive(Debug, Default)]
struct State {
    count: usize,
    closed: bool,
}

/// Semaphore-like handoff between the reducers of adjacent partitions.
///
/// Starts at zero. `wait` blocks until at least one `post` happened since the
/// last successful wait, or until the signal is closed.
#[derive(Debug, Default)]
pub struct CountingSignal {
    state: Mutex<State>,
    ready: Condvar,
}

impl CountingSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self) {
        let mut state = self.state.lock();
        state.count += 1;
        self.ready.notify_one();
    }

    pub fn wait(&self) -> Wake {
        let mut state = self.state.lock();
        while state.count == 0 && !state.closed {
            self.ready.wait(&mut state);
        }
        if state.count > 0 {
            state.count -= 1;
            Wake::Posted
        } else {
            Wake::Closed
        }
    }

    pub fn try_wait(&self) -> bool {
        let mut state = self.state.lock();
        if state.count > 0 {
            state.count -= 1;
            true
        } else {
            false
        }
    }

    /// Releases every current and future waiter once posted units run out.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.ready.notify_all();
    }

    /// Units posted and not yet consumed.
    pub fn pending(&self) -> usize {
        self.state.lock().count
    }
}
