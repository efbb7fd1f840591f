fn main() {
    if let Err(e) = oasgen_cli::cli::run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
