//! Version information for troubleshooting.

use once_cell::sync::Lazy;

/// Gets a human-readable string with the version number of volley, the
/// features it was built with, and the curl it is linked to.
pub fn version() -> &'static str {
    static VERSION_STRING: Lazy<String> = Lazy::new(|| {
        format!(
            "volley/{} (features:{}) curl/{}",
            env!("CARGO_PKG_VERSION"),
            env!("VOLLEY_FEATURES"),
            curl::Version::get().version(),
        )
    });

    &VERSION_STRING
}
