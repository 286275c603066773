#[cfg(test)]
mod tests {
    use geoseis_macros::test_traced;
    use tracing::{debug, error, info};

    #[test_traced(level = "INFO")]
    fn test_info_level() {
        info!("This is an info log");
        debug!("This is a debug log (won't be shown)");
        assert_eq!(2 + 2, 4);
    }

    #[test_traced]
    fn test_default_level() {
        debug!(traces = 3, "This is a debug log");
        assert_eq!(3 * 3, 9);
    }

    #[test_traced(level = "error")]
    fn test_lowercase_level() {
        error!("This is an error log");
        assert_eq!(5 * 2, 10);
    }

    #[test_traced]
    #[should_panic(expected = "boom")]
    fn test_panic_propagates() {
        info!("about to panic");
        panic!("boom");
    }
}
