//! Version information.

#[must_use]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Version string recorded in logs at startup.
#[must_use]
pub fn full_version() -> String {
    format!("benchsweep {}", version())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_version_names_the_tool() {
        assert!(full_version().starts_with("benchsweep "));
        assert!(!version().is_empty());
    }
}
