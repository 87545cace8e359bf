use parking_lot::Mutex;

/// Lock-protected counter that hands out every index in `[0, bound)` exactly
/// once. Both stages claim their work through one of these.
#[derive(Debug)]
pub struct WorkDistributor {
    next: Mutex<usize>,
    bound: usize,
}

impl WorkDistributor {
    pub fn new(bound: usize) -> Self {
        Self { next: Mutex::new(0), bound }
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Returns the next unclaimed index, or `None` once all are handed out.
    pub fn claim_next(&self) -> Option<usize> {
        let mut next = self.next.lock();
        if *next < self.bound {
            let claimed = *next;
            *next += 1;
            Some(claimed)
        } else {
            None
        }
    }

    /// Iterator that keeps claiming until the distributor is exhausted.
    pub fn claims(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::from_fn(move || self.claim_next())
    }
}
