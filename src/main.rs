fn main() {
    if let Err(err) = flowtalk::cli::main() {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}
