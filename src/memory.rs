//! Free memory readings used to decide when the daemon should restart itself.

/// Something that can tell how much memory is left.
pub trait MemoryProbe {
    /// Available memory in bytes, `None` when it cannot be determined
    fn available(&self) -> Option<u64>;
}

/// Reads `MemAvailable` from the kernel.
#[derive(Clone, Debug, Default)]
pub struct ProcMeminfo;

impl MemoryProbe for ProcMeminfo {
    fn available(&self) -> Option<u64> {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_mem_available(&meminfo)
    }
}

/// Bytes reported on the `MemAvailable:` line of a meminfo dump
pub fn parse_mem_available(meminfo: &str) -> Option<u64> {
    let line = meminfo
        .lines()
        .find(|line| line.starts_with("MemAvailable:"))?;

    let mut fields = line.split_whitespace().skip(1);
    let value: u64 = fields.next()?.parse().ok()?;
    match fields.next() {
        Some("kB") => Some(value.saturating_mul(1024)),
        None => Some(value),
        Some(_) => None,
    }
}

/// A probe that always reports the same amount. Handy when the platform has
/// no meminfo or in tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedMemory(pub Option<u64>);

impl MemoryProbe for FixedMemory {
    fn available(&self) -> Option<u64> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mem_available() {
        let meminfo = "MemTotal:        3884360 kB\n\
                       MemFree:          181384 kB\n\
                       MemAvailable:    2459800 kB\n\
                       Buffers:          147120 kB\n";
        assert_eq!(parse_mem_available(meminfo), Some(2459800 * 1024));
    }

    #[test]
    fn test_parse_missing_line() {
        assert_eq!(parse_mem_available("MemTotal: 10 kB\n"), None);
        assert_eq!(parse_mem_available("MemAvailable: lots kB\n"), None);
    }
}
