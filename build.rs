fn main() -> anyhow::Result<()> {
    // ESP-IDF environment is only present when building for the board
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        // Necessary for ESP-IDF
        embuild::espidf::sysenv::output();

        // Add crash log helper for better panic diagnostics
        println!("cargo:rustc-link-arg=-Wl,--undefined=esp_backtrace_print_app_description");
    }

    Ok(())
}
