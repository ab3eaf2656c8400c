fn main() {
    if let Err(err) = climb_rocks_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
