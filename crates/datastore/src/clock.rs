use time::OffsetDateTime;

/// Where modification timestamps come from.
pub trait Clock {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Always returns the same instant, so that tests can assert on emitted timestamps.
#[derive(Copy, Clone, Debug)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}
