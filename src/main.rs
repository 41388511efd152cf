fn main() {
    if let Err(err) = wgpu_bloom::run() {
        log::error!("Application error: {err}");
        eprintln!("Application error: {err}");
        std::process::exit(-1);
    }
}
