fn main() {
    if let Err(e) = assessment_vault_lib::run() {
        tracing::error!("{e}");
        eprintln!("{e}");
        std::process::exit(1);
    }
}
