use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rustc-env=VOLLEY_FEATURES={}", enabled_features().join(","));
}

/// Names of the crate features enabled for this build, sorted.
fn enabled_features() -> Vec<String> {
    let mut features = env::vars()
        .filter(|(_, value)| value == "1")
        .filter_map(|(name, _)| {
            name.strip_prefix("CARGO_FEATURE_")
                .map(|feature| feature.to_lowercase().replace('_', "-"))
        })
        .collect::<Vec<_>>();

    features.sort();
    features
}
