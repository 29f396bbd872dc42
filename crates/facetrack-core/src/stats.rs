use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters written by every worker and read by status queries.
#[derive(Debug, Default)]
pub struct TrackingStats {
    faces_detected: AtomicU64,
    attendance_recorded: AtomicU64,
    /// Time workers of the current generation spent in detect + record.
    busy_micros: AtomicU64,
}

impl TrackingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faces_detected(&self) -> u64 {
        self.faces_detected.load(Ordering::Relaxed)
    }

    pub fn attendance_recorded(&self) -> u64 {
        self.attendance_recorded.load(Ordering::Relaxed)
    }

    pub(crate) fn add_faces(&self, count: u64) {
        self.faces_detected.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn add_attendance(&self) {
        self.attendance_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_busy(&self, elapsed: Duration) {
        self.busy_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub(crate) fn busy(&self) -> Duration {
        Duration::from_micros(self.busy_micros.load(Ordering::Relaxed))
    }

    pub(crate) fn reset_busy(&self) {
        self.busy_micros.store(0, Ordering::Relaxed);
    }
}

/// Share of worker capacity spent busy over `elapsed`, clamped to [0, 1].
pub(crate) fn load_fraction(busy: Duration, elapsed: Duration, workers: usize) -> f64 {
    if workers == 0 || elapsed.is_zero() {
        return 0.0;
    }
    let capacity = elapsed.as_secs_f64() * workers as f64;
    (busy.as_secs_f64() / capacity).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate_across_threads() {
        let stats = std::sync::Arc::new(TrackingStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.add_faces(1);
                        stats.add_attendance();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.faces_detected(), 8000);
        assert_eq!(stats.attendance_recorded(), 8000);
    }

    #[test]
    fn test_load_fraction() {
        let secs = Duration::from_secs;
        assert_eq!(load_fraction(secs(1), secs(4), 1), 0.25);
        assert_eq!(load_fraction(secs(1), secs(4), 2), 0.125);
        assert_eq!(load_fraction(secs(10), secs(1), 1), 1.0);
        assert_eq!(load_fraction(secs(1), Duration::ZERO, 1), 0.0);
        assert_eq!(load_fraction(secs(1), secs(1), 0), 0.0);
    }
}
