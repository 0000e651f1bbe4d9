fn main() {
    if let Err(err) = posewatch_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
