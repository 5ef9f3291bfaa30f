fn main() {
    println!("cargo:rerun-if-env-changed=LEDTHING_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=LEDTHING_WIFI_PASS");

    // Host builds (tests, fuzzing) run without the ESP-IDF toolchain.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
