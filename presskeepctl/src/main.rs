use clap::Parser;

fn main() {
    let cli = presskeepctl::Cli::parse();
    if let Err(err) = presskeepctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
