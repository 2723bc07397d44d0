use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check every record of a BAM/SAM/CRAM file against the read invariants
    Validate {
        /// Path to the BAM file
        bam_file: String,

        /// Reference FASTA (required for CRAM)
        #[arg(short = 'r', long = "reference")]
        reference: Option<String>,

        /// Worker threads (default: config value, 0 = all cores)
        #[arg(short = 't', long)]
        threads: Option<usize>,

        /// Stop after this many records (default: config value, 0 = all)
        #[arg(long)]
        max_records: Option<usize>,

        /// Abort on the first invalid record
        #[arg(long)]
        strict: bool,
    },

    /// Write a per-read mismatch/SNP/insertion summary as JSON
    Inspect {
        /// Path to the BAM file
        bam_file: String,

        /// Output file for the read summaries
        #[arg(short = 'o', long = "output", default_value = "read_summary.json")]
        output_file: String,

        /// Reference FASTA (required for CRAM)
        #[arg(short = 'r', long = "reference")]
        reference: Option<String>,

        /// Minimum base quality for a high-quality SNP (default: config value)
        #[arg(long)]
        min_base_quality: Option<u8>,

        /// Stop after this many records (default: config value, 0 = all)
        #[arg(long)]
        max_records: Option<usize>,

        /// Only summarize canonical records (primary, not duplicate)
        #[arg(long)]
        canonical_only: bool,
    },

    /// Validate reads given as a JSON array of raw records
    CheckJson {
        /// JSON file containing an array of records
        json_file: String,
    },
}
