use std::time::{Duration, Instant};

use crate::error::{Result, WarmgraphError};

/// Point in time after which a search or extraction gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No deadline; the call runs to completion.
    pub fn none() -> Self {
        Deadline(None)
    }

    pub fn at(instant: Instant) -> Self {
        Deadline(Some(instant))
    }

    pub fn after(timeout: Duration) -> Self {
        Deadline(Instant::now().checked_add(timeout))
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.0, Some(at) if Instant::now() >= at)
    }

    /// `Err(Timeout)` naming `operation` once the deadline has passed.
    pub fn check(&self, operation: &'static str) -> Result<()> {
        if self.is_expired() {
            return Err(WarmgraphError::Timeout(operation));
        }
        Ok(())
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Deadline::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_never_expires() {
        assert!(Deadline::none().check("search").is_ok());
    }

    #[test]
    fn test_past_deadline_times_out() {
        let deadline = Deadline::at(Instant::now());
        let err = deadline.check("path search").unwrap_err();
        assert!(matches!(err, WarmgraphError::Timeout("path search")));
    }

    #[test]
    fn test_future_deadline_ok() {
        assert!(Deadline::after(Duration::from_secs(60)).check("extract").is_ok());
    }
}
