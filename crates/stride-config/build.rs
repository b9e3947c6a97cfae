fn main() {
    // option_env!() values are cached by cargo unless we ask for a rerun.
    println!("cargo:rerun-if-env-changed=STRIDE_API_URL");
    println!("cargo:rerun-if-env-changed=STRIDE_APP_ORIGIN");
}
