use sysinfo::System;

/// Logical cores on this host, used as the default local concurrency limit. Never less than 1.
pub fn available_cores() -> usize {
    let mut sys = System::new();
    sys.refresh_cpu_all();

    let cores = sys.cpus().len();
    if cores == 0 {
        log::warn!("Could not detect the number of CPU cores, running one scenario at a time");
    }

    cores.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_least_one_core() {
        assert!(available_cores() >= 1);
    }
}
