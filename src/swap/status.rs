use crate::venue::SubTxStatus;

/// Bitwise-combined outcome across all sub-transactions of one route.
///
/// Combination and precedence:
///
/// | aggregate mask                      | outcome     |
/// |-------------------------------------|-------------|
/// | empty, or any PENDING / PARTIAL bit | in process  |
/// | SUCCEEDED alone                     | success     |
/// | SUCCEEDED mixed with anything else  | partial     |
/// | TIMED_OUT (no success bit)          | timeout     |
/// | FAILED / UNKNOWN (catch-all)        | failure     |
///
/// Success is matched most specifically first; failure is the catch-all. A
/// mixed `SUCCEEDED | TIMED_OUT` mask counts as partial: one completed leg
/// makes the route partially complete whatever happened to the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusMask(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    InProcess,
    Success,
    Partial,
    Timeout,
    Failure,
}

impl StatusMask {
    pub const NEW: Self = Self(0);
    pub const SUCCEEDED: Self = Self(1);
    pub const PENDING: Self = Self(2);
    pub const PARTIALLY_COMPLETE: Self = Self(4);
    pub const TIMED_OUT: Self = Self(8);
    pub const FAILED: Self = Self(16);
    pub const UNKNOWN: Self = Self(32);

    const IN_PROCESS: Self = Self(Self::PENDING.0 | Self::PARTIALLY_COMPLETE.0);

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn flag(status: SubTxStatus) -> Self {
        match status {
            SubTxStatus::Succeeded => Self::SUCCEEDED,
            SubTxStatus::Pending => Self::PENDING,
            SubTxStatus::PartiallyComplete => Self::PARTIALLY_COMPLETE,
            SubTxStatus::TimedOut => Self::TIMED_OUT,
            SubTxStatus::Failed => Self::FAILED,
            SubTxStatus::Unknown => Self::UNKNOWN,
        }
    }

    pub fn combine(statuses: impl IntoIterator<Item = SubTxStatus>) -> Self {
        statuses
            .into_iter()
            .fold(Self::NEW, |mask, status| Self(mask.0 | Self::flag(status).0))
    }

    fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn outcome(self) -> RouteOutcome {
        if self == Self::NEW || self.intersects(Self::IN_PROCESS) {
            return RouteOutcome::InProcess;
        }
        if self == Self::SUCCEEDED {
            return RouteOutcome::Success;
        }
        if self.intersects(Self::SUCCEEDED) {
            return RouteOutcome::Partial;
        }
        if self.intersects(Self::TIMED_OUT) {
            return RouteOutcome::Timeout;
        }
        RouteOutcome::Failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combined(statuses: &[SubTxStatus]) -> RouteOutcome {
        StatusMask::combine(statuses.iter().copied()).outcome()
    }

    #[test]
    fn lone_success_is_success() {
        assert_eq!(combined(&[SubTxStatus::Succeeded]), RouteOutcome::Success);
        assert_eq!(
            combined(&[SubTxStatus::Succeeded, SubTxStatus::Succeeded]),
            RouteOutcome::Success
        );
    }

    #[test]
    fn mixed_success_takes_precedence_over_failure() {
        assert_eq!(
            combined(&[SubTxStatus::Succeeded, SubTxStatus::Failed]),
            RouteOutcome::Partial
        );
    }

    #[test]
    fn mixed_success_and_timeout_is_partial() {
        assert_eq!(
            combined(&[SubTxStatus::Succeeded, SubTxStatus::TimedOut]),
            RouteOutcome::Partial
        );
    }

    #[test]
    fn pending_keeps_waiting() {
        assert_eq!(combined(&[SubTxStatus::Pending]), RouteOutcome::InProcess);
        assert_eq!(
            combined(&[SubTxStatus::Succeeded, SubTxStatus::Pending]),
            RouteOutcome::InProcess
        );
        assert_eq!(
            combined(&[SubTxStatus::PartiallyComplete]),
            RouteOutcome::InProcess
        );
        assert_eq!(combined(&[]), RouteOutcome::InProcess);
    }

    #[test]
    fn timeout_without_success() {
        assert_eq!(combined(&[SubTxStatus::TimedOut]), RouteOutcome::Timeout);
        assert_eq!(
            combined(&[SubTxStatus::TimedOut, SubTxStatus::Failed]),
            RouteOutcome::Timeout
        );
    }

    #[test]
    fn failure_is_the_catch_all() {
        assert_eq!(
            combined(&[SubTxStatus::Failed, SubTxStatus::Unknown]),
            RouteOutcome::Failure
        );
        assert_eq!(combined(&[SubTxStatus::Unknown]), RouteOutcome::Failure);
    }

    #[test]
    fn bits_round_trip() {
        let mask = StatusMask::combine([SubTxStatus::Succeeded, SubTxStatus::TimedOut]);
        assert_eq!(mask.bits(), 9);
        assert_eq!(StatusMask::from_bits(9), mask);
    }
}
