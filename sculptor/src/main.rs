use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use structopt::StructOpt;

use sculptor::generate_head::GenerateHeadCommand;
use sculptor::manage_library::LibraryCommand;
use sculptor::scan_images::ScanImagesCommand;

#[derive(StructOpt)]
#[structopt(about = "Facial mesh sculptor")]
struct Opts {
    #[structopt(help = "Logging level", long, default_value = "info")]
    log_level: LevelFilter,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
enum Command {
    Scan(ScanImagesCommand),
    Generate(GenerateHeadCommand),
    Library(LibraryCommand),
}

fn main() {
    let opts = Opts::from_args();

    if let Err(err) = TermLogger::init(
        opts.log_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ) {
        eprintln!("failed to initialize logger: {}", err);
    }

    let res = match &opts.command {
        Command::Scan(command) => command.run(),
        Command::Generate(command) => command.run(),
        Command::Library(command) => command.run(),
    };

    if let Err(err) = res {
        eprintln!("error: {:?}", err);
        std::process::exit(1);
    }
}
