use std::time::SystemTime;

/// Returns the current UNIX timestamp in microseconds.
#[inline]
pub fn unix_micros() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_micros() as u64
}

#[allow(non_upper_case_globals)]
pub mod constants {
    pub const KiB: usize = 1024;
    pub const MiB: usize = 1024 * KiB;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn micros_monotonic_enough() {
        let a = unix_micros();
        let b = unix_micros();
        assert!(b >= a);
        // Sanity: later than 2020-01-01 in micros.
        assert!(a > 1_577_836_800_000_000);
    }
}
