use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CounterError {
    #[error("a pending operation counter must begin with at least one operation")]
    EmptyBegin,
    #[error("completion received with no operation pending")]
    Underflow,
    #[error("counter already reached zero for this walk")]
    AlreadyComplete,
}

/// Fan-out/fan-in join over asynchronous responses.
///
/// The counter holds the number of responses still awaited. Each response is
/// settled with one [`complete_one`](Self::complete_one), followed by a
/// [`fan_out`](Self::fan_out) for the requests it caused, and only then is
/// the counter checked for zero. Checking between the two would report a
/// walk as finished while its children are still being issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperationCounter {
    pending: usize,
    finished: bool,
}

impl PendingOperationCounter {
    pub fn begin(n: usize) -> Result<Self, CounterError> {
        if n == 0 {
            return Err(CounterError::EmptyBegin);
        }
        Ok(PendingOperationCounter {
            pending: n,
            finished: false,
        })
    }

    pub fn complete_one(&mut self) -> Result<(), CounterError> {
        if self.finished {
            return Err(CounterError::AlreadyComplete);
        }
        self.pending = self.pending.checked_sub(1).ok_or(CounterError::Underflow)?;
        Ok(())
    }

    pub fn fan_out(&mut self, k: usize) -> Result<(), CounterError> {
        if self.finished {
            return Err(CounterError::AlreadyComplete);
        }
        self.pending += k;
        Ok(())
    }

    /// Marks the walk finished if nothing is pending. Returns `true` exactly
    /// once per counter.
    pub fn check_complete(&mut self) -> bool {
        if self.pending == 0 && !self.finished {
            self.finished = true;
            return true;
        }
        false
    }

    /// One response in the required order: decrement, fan out, then check.
    pub fn settle(&mut self, fan_out: usize) -> Result<bool, CounterError> {
        self.complete_one()?;
        self.fan_out(fan_out)?;
        Ok(self.check_complete())
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
