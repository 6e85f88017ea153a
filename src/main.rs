fn main() {
    if let Err(err) = storyfront_lib::run() {
        eprintln!("storyfront: {err:#}");
        std::process::exit(1);
    }
}
