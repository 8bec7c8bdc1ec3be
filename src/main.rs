mod app;
mod cli;

fn main() {
    let cli = cli::parse();

    if let Err(e) = ffslide::logging::init_tracing(cli.verbose) {
        eprintln!("Warning: could not initialise logging: {:#}", e);
    }

    app::run(cli);
}
