// AgenType - command line entry

fn main() {
    let _guard = agentype::init_logging();
    if let Err(error) = agentype::run() {
        tracing::error!("{}", error);
        std::process::exit(1);
    }
}
