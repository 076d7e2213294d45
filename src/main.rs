use clap::Parser;

use tethercount::cli::{Cli, Command};
use tethercount::container::ContainerReader;
use tethercount::counter::count_words;
use tethercount::harness;
use tethercount::model::Schema;
use tethercount::TcResult;

fn main() {
    tethercount::logging::init();

    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run() -> TcResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            let config = args.to_config()?;
            let report = harness::run_scenario(&config)?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "verified {} output records against {} distinct words (run {})",
                    report.records_verified, report.distinct_words, report.run_id
                );
            }
            Ok(())
        }
        Command::Inspect(args) => {
            let reader = ContainerReader::open(&args.container)?;
            if args.json {
                println!("{}", serde_json::to_string(&reader.schema().to_descriptor())?);
                for record in reader {
                    println!("{}", serde_json::to_string(&record?)?);
                }
            } else {
                println!("schema: {}", reader.schema().to_descriptor());
                for record in reader {
                    println!("{}", record?);
                }
            }
            Ok(())
        }
        Command::Schema => {
            println!("{}", Schema::word_count_pair().to_descriptor_string());
            Ok(())
        }
        Command::Count(args) => {
            let lines = args.input.resolve()?;
            for (word, count) in count_words(&lines) {
                println!("{word}\t{count}");
            }
            Ok(())
        }
    }
}
