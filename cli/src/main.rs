//! Geoseis CLI

use clap::{Arg, ArgAction, ArgMatches, Command};
use geoseis_runtime::storage::fs;
use geoseis_storage::{ExportConfig, ImportConfig};
use std::path::PathBuf;
use tracing::error;

mod commands;

/// Returns the version of the crate.
pub const fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Flag for verbose output
const VERBOSE_FLAG: &str = "verbose";

fn dataset_arg() -> Arg {
    Arg::new("dataset")
        .long("dataset")
        .required(true)
        .help("Name of the seismic dataset")
        .value_parser(clap::value_parser!(String))
}

fn file_arg(help: &'static str) -> Arg {
    Arg::new("file")
        .long("file")
        .required(true)
        .help(help)
        .value_parser(clap::value_parser!(PathBuf))
}

fn threads_arg() -> Arg {
    Arg::new("threads")
        .long("threads")
        .default_value("0")
        .allow_negative_numbers(true)
        .help("Worker threads (zero or negative for one per core)")
        .value_parser(clap::value_parser!(i32))
}

fn buffer_arg() -> Arg {
    Arg::new("buffer")
        .long("buffer")
        .default_value(commands::DEFAULT_BUFFER)
        .help("Traces per worker task (must be >= 1)")
        .value_parser(clap::builder::RangedU64ValueParser::<usize>::new().range(1..))
}

/// Entrypoint for the Geoseis CLI
fn main() -> std::process::ExitCode {
    // Define application
    let matches = Command::new("geoseis")
        .version(crate_version())
        .about("Import, export and inspect seismic datasets.")
        .arg(
            Arg::new(VERBOSE_FLAG)
                .short('v')
                .long(VERBOSE_FLAG)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dir")
                .long("dir")
                .required(true)
                .help("Directory holding the storage")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("container")
                .long("container")
                .default_value("geoseis")
                .help("Name of the container (letters, digits, '-' and '_')")
                .value_parser(clap::value_parser!(String)),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new(commands::IMPORT_CMD)
                .about("Import a SEG-Y file into a dataset, creating it if needed.")
                .arg(dataset_arg())
                .arg(file_arg("Path to the SEG-Y file"))
                .arg(
                    Arg::new("append")
                        .long("append")
                        .help("Append traces instead of replacing them")
                        .action(ArgAction::SetTrue),
                )
                .arg(threads_arg())
                .arg(buffer_arg()),
        )
        .subcommand(
            Command::new(commands::EXPORT_CMD)
                .about("Export a dataset to a new SEG-Y file.")
                .arg(dataset_arg())
                .arg(file_arg("Path of the SEG-Y file to create"))
                .arg(
                    Arg::new("format")
                        .long("format")
                        .default_value("ieee")
                        .help("Sample format")
                        .value_parser(commands::FORMATS),
                )
                .arg(
                    Arg::new("endian")
                        .long("endian")
                        .default_value("big")
                        .help("Byte order")
                        .value_parser(commands::ENDIANS),
                )
                .arg(
                    Arg::new("encoding")
                        .long("encoding")
                        .default_value("ebcdic")
                        .help("Text header encoding")
                        .value_parser(commands::ENCODINGS),
                )
                .arg(threads_arg())
                .arg(buffer_arg()),
        )
        .subcommand(
            Command::new(commands::INFO_CMD)
                .about("Describe a dataset.")
                .arg(dataset_arg()),
        )
        .subcommand(
            Command::new(commands::BOUNDARY_CMD)
                .about("Print the boundary polygon of a dataset.")
                .arg(dataset_arg())
                .arg(
                    Arg::new("units")
                        .long("units")
                        .help("Length units of the output (empty for the dataset's own)")
                        .value_parser(clap::value_parser!(String)),
                ),
        )
        .subcommand(
            Command::new(commands::INDEX_CMD)
                .about("List traces whose header value lies in a range.")
                .arg(dataset_arg())
                .arg(
                    Arg::new("key")
                        .long("key")
                        .required(true)
                        .help("Header name")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    Arg::new("min")
                        .long("min")
                        .required(true)
                        .allow_negative_numbers(true)
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    Arg::new("max")
                        .long("max")
                        .required(true)
                        .allow_negative_numbers(true)
                        .value_parser(clap::value_parser!(f64)),
                ),
        )
        .subcommand(
            Command::new(commands::LIST_CMD).about("List the datasets in the container."),
        )
        .get_matches();

    // Create logger
    let level = if matches.get_flag(VERBOSE_FLAG) {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let dir = matches.get_one::<PathBuf>("dir").unwrap();
    let container = matches.get_one::<String>("container").unwrap();
    let storage = fs::Storage::new(fs::Config::new(dir));
    match run(storage, container, &matches) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            std::process::ExitCode::FAILURE
        }
    }
}

fn run(storage: fs::Storage, container: &str, matches: &ArgMatches) -> Result<(), commands::Error> {
    let dataset = |m: &ArgMatches| m.get_one::<String>("dataset").unwrap().clone();
    let file = |m: &ArgMatches| m.get_one::<PathBuf>("file").unwrap().clone();
    match matches.subcommand() {
        Some((commands::IMPORT_CMD, m)) => {
            let cfg = ImportConfig {
                append: m.get_flag("append"),
                threads: *m.get_one::<i32>("threads").unwrap(),
                buffer_traces: *m.get_one::<usize>("buffer").unwrap(),
                ..Default::default()
            };
            let traces = commands::import(storage, container, &dataset(m), &file(m), &cfg)?;
            println!("{traces} traces");
        }
        Some((commands::EXPORT_CMD, m)) => {
            let cfg = ExportConfig {
                format: commands::parse_format(m.get_one::<String>("format").unwrap())?,
                endian: commands::parse_endian(m.get_one::<String>("endian").unwrap())?,
                encoding: commands::parse_encoding(m.get_one::<String>("encoding").unwrap())?,
                threads: *m.get_one::<i32>("threads").unwrap(),
                buffer_traces: *m.get_one::<usize>("buffer").unwrap(),
                ..Default::default()
            };
            commands::export(storage, container, &dataset(m), &file(m), &cfg)?;
        }
        Some((commands::INFO_CMD, m)) => {
            print!("{}", commands::info(storage, container, &dataset(m))?);
        }
        Some((commands::BOUNDARY_CMD, m)) => {
            let units = m.get_one::<String>("units").map_or("", String::as_str);
            for point in commands::boundary(storage, container, &dataset(m), units)? {
                println!("{} {}", point.x, point.y);
            }
        }
        Some((commands::INDEX_CMD, m)) => {
            let key = m.get_one::<String>("key").unwrap();
            let min = *m.get_one::<f64>("min").unwrap();
            let max = *m.get_one::<f64>("max").unwrap();
            for trace in commands::query(storage, container, &dataset(m), key, min, max)? {
                println!("{trace}");
            }
        }
        Some((commands::LIST_CMD, _)) => {
            for name in commands::list(storage, container)? {
                println!("{name}");
            }
        }
        _ => unreachable!("a subcommand is required"),
    }
    Ok(())
}
