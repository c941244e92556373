use std::time::Duration;

/// Exponents are drawn from `start..EXPONENT_END`
pub const EXPONENT_END: u32 = 100;

/// One interval of the ajar backoff, measured in minutes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffStep {
    pub exponent: u32,
    pub minutes: u64,
}

impl BackoffStep {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.minutes.saturating_mul(60))
    }
}

/// Powers of `base`, used to space out notifications while the door is left
/// open. The range starts at a fairly high exponent so the first reminder is
/// not immediate. After the last exponent the final step repeats.
#[derive(Clone, Debug)]
pub struct ExponentBackoff {
    base: u64,
    start: u32,
    next_exponent: u32,
    last: Option<BackoffStep>,
}

impl ExponentBackoff {
    pub fn new(base: u64, start: u32) -> Self {
        Self {
            base,
            start,
            next_exponent: start,
            last: None,
        }
    }

    /// A generator whose next step is the one after `exponent`
    pub fn resume_after(base: u64, start: u32, exponent: u32) -> Self {
        let mut backoff = Self::new(base, start);
        backoff.next_exponent = exponent.saturating_add(1).max(start);
        backoff.last = Some(backoff.step(exponent));
        backoff
    }

    pub fn reset(&mut self) {
        self.next_exponent = self.start;
        self.last = None;
    }

    pub fn step(&self, exponent: u32) -> BackoffStep {
        let minutes = self.base.checked_pow(exponent).unwrap_or(u64::MAX);
        BackoffStep { exponent, minutes }
    }
}

impl Iterator for ExponentBackoff {
    type Item = BackoffStep;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_exponent >= EXPONENT_END {
            // Exhausted, keep reminding at the longest interval
            return Some(self.last.unwrap_or_else(|| self.step(EXPONENT_END - 1)));
        }

        let step = self.step(self.next_exponent);
        self.next_exponent += 1;
        self.last = Some(step);
        Some(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_powers_of_base() {
        let minutes: Vec<u64> = ExponentBackoff::new(3, 4).take(3).map(|s| s.minutes).collect();
        assert_eq!(minutes, vec![81, 243, 729]);
    }

    #[test]
    fn test_interval_in_seconds() {
        let step = ExponentBackoff::new(2, 1).next().unwrap();
        assert_eq!(step, BackoffStep { exponent: 1, minutes: 2 });
        assert_eq!(step.interval(), Duration::from_secs(120));
    }

    #[test]
    fn test_reset_starts_over() {
        let mut backoff = ExponentBackoff::new(3, 4);
        backoff.next();
        backoff.next();
        backoff.reset();
        assert_eq!(backoff.next().unwrap().exponent, 4);
    }

    #[test]
    fn test_resume_after() {
        let mut backoff = ExponentBackoff::resume_after(3, 4, 6);
        assert_eq!(backoff.next().unwrap(), BackoffStep { exponent: 7, minutes: 2187 });
    }

    #[test]
    fn test_exhausted_repeats_last_and_saturates() {
        let mut backoff = ExponentBackoff::new(3, 98);
        assert_eq!(backoff.next().unwrap().exponent, 98);
        let last = backoff.next().unwrap();
        assert_eq!(last.exponent, 99);
        assert_eq!(last.minutes, u64::MAX);
        assert_eq!(backoff.next().unwrap(), last);
        assert_eq!(last.interval(), Duration::from_secs(u64::MAX));
    }
}
