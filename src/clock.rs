//! Time source for mission pacing and packet timestamps

use core::future::Future;

/// Wall clock plus cooperative delay
pub trait Clock {
    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> u64;

    /// Suspend the calling role for `ms` milliseconds
    fn delay_ms(&mut self, ms: u32) -> impl Future<Output = ()>;
}

/// Hosted clock backed by the system time
///
/// `delay_ms` parks the calling thread with `std::thread::sleep` and never
/// yields. Drive each role on its own thread with a blocking executor such
/// as `futures::executor::block_on`. Roles sharing an async executor need a
/// yielding clock such as `EmbassyClock` (feature `embedded`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    async fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(ms as u64));
    }
}

/// Clock for roles running on an embassy executor
///
/// Embassy time starts at boot, so `epoch_offset_ms` is added to produce
/// wall clock timestamps (zero keeps boot-relative stamps).
#[cfg(feature = "embedded")]
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock {
    pub epoch_offset_ms: u64,
}

#[cfg(feature = "embedded")]
impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        self.epoch_offset_ms + embassy_time::Instant::now().as_millis()
    }

    async fn delay_ms(&mut self, ms: u32) {
        embassy_time::Timer::after(embassy_time::Duration::from_millis(ms as u64)).await;
    }
}
