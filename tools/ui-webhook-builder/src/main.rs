fn main() {
    match webhook_builder::run() {
        Ok(code) => std::process::exit(code),
        Err(error) if error.is_cancelled() => std::process::exit(0),
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    }
}
