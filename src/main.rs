fn main() {
    if let Err(err) = sightline_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
