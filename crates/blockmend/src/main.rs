#![forbid(unsafe_code)]

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(error) = blockmend::run_from_env() {
        eprintln!("{error}");
        std::process::exit(error.exit_code());
    }
}
