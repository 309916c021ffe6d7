fn main() {
    // Rerun when git HEAD changes (commit, checkout, etc.)
    println!("cargo:rerun-if-changed=.git/HEAD");

    let output = std::process::Command::new("git")
        .args(["describe", "--always", "--dirty", "--tags"])
        .output();

    // Outside a checkout (crate tarball, vendored build) fall back to the package version.
    let version = match output {
        Ok(o) if o.status.success() => {
            let described = String::from_utf8_lossy(&o.stdout).trim().to_string();
            format!("{} ({})", env!("CARGO_PKG_VERSION"), described)
        }
        _ => env!("CARGO_PKG_VERSION").to_string(),
    };

    println!("cargo:rustc-env=BODYLANG_BUILD_VERSION={}", version);
}
