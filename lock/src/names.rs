//! Lock name construction, `spec.md` §4.4 "Lock names".

/// Per-product lock name: `product:{source}:{product_id}`.
pub fn product_lock_name(source: &str, product_id: &str) -> String {
    format!("product:{source}:{product_id}")
}

/// Optional job-level lock name, serializing an entire run of a given mode:
/// `job:{mode}`.
pub fn job_lock_name(mode: &str) -> String {
    format!("job:{mode}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_lock_name_matches_schema() {
        assert_eq!(product_lock_name("coinbase", "BTC-USD"), "product:coinbase:BTC-USD");
    }

    #[test]
    fn job_lock_name_matches_schema() {
        assert_eq!(job_lock_name("incremental"), "job:incremental");
    }
}
