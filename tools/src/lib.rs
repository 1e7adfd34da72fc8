use anyhow::Context as _;
use anyhow::Result;
use std::env;
use std::fs;
use std::io;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::Registry;
use tracing_tree::HierarchicalLayer;

pub mod generate;
pub mod points;
pub mod render;

/// Parses the command-line arguments, and prints usage then exits on `-h`.
///
/// Options `-h` (help) and `-t` (chrome trace) are added to `options`.
pub fn parse_args(
    mut options: getopts::Options,
    usage: &str,
    max_free_args: usize,
) -> Result<getopts::Matches> {
    options.optflag("h", "help", "print this help menu");
    options.optopt("t", "trace", "emit a chrome trace", "FILE");

    let matches = options.parse(env::args().skip(1))?;

    if matches.opt_present("h") {
        eprintln!("{}", options.usage(usage));
        std::process::exit(0);
    }
    if matches.free.len() > max_free_args {
        anyhow::bail!("too many arguments\n\n{}", options.usage(usage));
    }

    Ok(matches)
}

/// Installs the tracing subscriber.  Filtering is done through the `LOG`
/// environment variable.
///
/// The returned guard must be kept alive until the end of the program for the
/// chrome trace to be written.
pub fn init_tracing(matches: &getopts::Matches) -> Option<tracing_chrome::FlushGuard> {
    let registry = Registry::default().with(EnvFilter::from_env("LOG")).with(
        HierarchicalLayer::new(4)
            .with_thread_ids(true)
            .with_targets(true)
            .with_bracketed_fields(true),
    );
    match matches.opt_str("t") {
        Some(filename) => {
            let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
                .file(filename)
                .build();
            registry.with(chrome_layer).init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

/// Opens the given file for reading, or stdin when `path` is `None` or `-`.
pub fn reader(path: Option<&String>) -> Result<Box<dyn io::BufRead>> {
    Ok(match path.map(String::as_str) {
        Some("-") | None => Box::new(io::stdin().lock()),
        Some(filename) => {
            let file = fs::File::open(filename)
                .with_context(|| format!("failed to open {filename:?}"))?;
            Box::new(io::BufReader::new(file))
        }
    })
}

/// Creates the given file for writing, or stdout when `path` is `None` or
/// `-`.
pub fn writer(path: Option<&String>) -> Result<Box<dyn io::Write>> {
    Ok(match path.map(String::as_str) {
        Some("-") | None => Box::new(io::BufWriter::new(io::stdout().lock())),
        Some(filename) => {
            let file = fs::File::create(filename)
                .with_context(|| format!("failed to create {filename:?}"))?;
            Box::new(io::BufWriter::new(file))
        }
    })
}
