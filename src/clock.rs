#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::_rdtsc;

/// Wall-clock microseconds since the UNIX epoch. The default choice for the
/// logger's injected timestamp function when human-readable times matter
/// more than per-call cost.
pub fn wall_clock_micros() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

/// Raw monotonic ticks with the highest precision the architecture offers.
/// Cheaper than the wall clock; units are CPU-specific and must be converted
/// offline.
#[inline(always)]
pub fn raw_ticks() -> i64 {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        _rdtsc() as i64
    }

    #[cfg(target_arch = "aarch64")]
    unsafe {
        let mut value: u64;
        std::arch::asm!("mrs {}, cntvct_el0", out(reg) value);
        value as i64
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        wall_clock_micros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wall_clock_advances() {
        let first = wall_clock_micros();
        thread::sleep(Duration::from_micros(100));
        let second = wall_clock_micros();
        assert!(second > first);
    }

    #[test]
    fn ticks_are_monotonic() {
        let mut prev = raw_ticks();
        for _ in 0..1000 {
            let current = raw_ticks();
            assert!(current >= prev);
            prev = current;
        }
    }
}
