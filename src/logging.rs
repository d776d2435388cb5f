use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber filtered by `RUST_LOG` (default `info`).
///
/// Front ends call this once at startup. Calling it again, or after another
/// subscriber was installed, does nothing.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_twice_is_harmless() {
        super::init();
        super::init();
        tracing::info!("logging initialised");
    }
}
