use clap::Parser;
use decodingus_reads::{cli, commands};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = cli::Args::parse();

    let result = match args.command {
        cli::Commands::Validate {
            bam_file,
            reference,
            threads,
            max_records,
            strict,
        } => commands::validate::run(bam_file, reference, threads, max_records, strict),
        cli::Commands::Inspect {
            bam_file,
            output_file,
            reference,
            min_base_quality,
            max_records,
            canonical_only,
        } => commands::inspect::run(
            bam_file,
            output_file,
            reference,
            min_base_quality,
            max_records,
            canonical_only,
        ),
        cli::Commands::CheckJson { json_file } => commands::check_json::run(json_file),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
