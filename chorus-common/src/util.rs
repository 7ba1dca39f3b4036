use thiserror::Error;
use time::Duration;

/// A strictly positive span of time, e.g. a query timeout.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct PositiveDuration(Duration);

impl PositiveDuration {
    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        duration.is_positive().then_some(Self(duration))
    }

    pub fn from_millis(millis: u64) -> Result<Self, NonPositiveDurationError> {
        let millis = i64::try_from(millis).unwrap_or(i64::MAX);
        Duration::milliseconds(millis).try_into()
    }

    #[must_use]
    pub fn get(self) -> Duration {
        self.0
    }

    #[must_use]
    pub fn to_std(self) -> std::time::Duration {
        self.0.unsigned_abs()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The duration is not positive: {0}")]
pub struct NonPositiveDurationError(Duration);

impl TryFrom<Duration> for PositiveDuration {
    type Error = NonPositiveDurationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NonPositiveDurationError(value))
    }
}

#[cfg(test)]
mod tests {
    use crate::util::PositiveDuration;
    use time::Duration;

    #[test]
    fn only_positive_durations() {
        assert!(PositiveDuration::new(Duration::ZERO).is_none());
        assert!(PositiveDuration::new(Duration::seconds(-1)).is_none());
        assert!(PositiveDuration::from_millis(0).is_err());

        let timeout = PositiveDuration::from_millis(5000).unwrap();
        assert_eq!(timeout.get(), Duration::seconds(5));
        assert_eq!(timeout.to_std(), std::time::Duration::from_secs(5));
    }
}
