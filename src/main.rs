fn main() {
    if let Err(err) = mindful_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
