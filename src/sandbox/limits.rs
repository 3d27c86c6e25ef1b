//! Per-run resource limits.

use wasmtime::ResourceLimiter;

/// Largest table a guest may grow to, in elements.
const MAX_TABLE_ELEMENTS: usize = 10_000;

/// Caps linear memory and table growth for one guest instance.
///
/// Attached to the store, so every memory the guest creates or grows is
/// checked, including the initial allocation at instantiation.
#[derive(Debug)]
pub struct SandboxLimiter {
    memory_limit: usize,
    memory_used: usize,
}

impl SandboxLimiter {
    #[must_use]
    pub fn new(memory_limit: usize) -> Self {
        Self {
            memory_limit,
            memory_used: 0,
        }
    }

    /// Bytes of linear memory currently granted.
    #[must_use]
    pub fn memory_used(&self) -> usize {
        self.memory_used
    }
}

impl ResourceLimiter for SandboxLimiter {
    fn memory_growing(
        &mut self,
        current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        if desired > self.memory_limit {
            tracing::warn!(
                current,
                desired,
                limit = self.memory_limit,
                "guest memory growth denied"
            );
            return Ok(false);
        }
        self.memory_used = desired;
        Ok(true)
    }

    fn table_growing(
        &mut self,
        current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        if desired > MAX_TABLE_ELEMENTS {
            tracing::warn!(current, desired, "guest table growth denied");
            return Ok(false);
        }
        Ok(true)
    }

    fn instances(&self) -> usize {
        1
    }

    fn tables(&self) -> usize {
        1
    }

    fn memories(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_within_limit_is_allowed() {
        let mut limiter = SandboxLimiter::new(1024 * 1024);
        assert!(limiter.memory_growing(0, 64 * 1024, None).unwrap());
        assert_eq!(limiter.memory_used(), 64 * 1024);
    }

    #[test]
    fn growth_past_limit_is_denied() {
        let mut limiter = SandboxLimiter::new(1024 * 1024);
        assert!(!limiter.memory_growing(0, 2 * 1024 * 1024, None).unwrap());
        assert_eq!(limiter.memory_used(), 0);
    }

    #[test]
    fn oversized_tables_are_denied() {
        let mut limiter = SandboxLimiter::new(1024);
        assert!(limiter.table_growing(0, 16, None).unwrap());
        assert!(!limiter.table_growing(0, MAX_TABLE_ELEMENTS + 1, None).unwrap());
    }
}
