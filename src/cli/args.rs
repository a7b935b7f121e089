use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "barseq-pipelines", version)]
pub struct Arguments {
    #[arg(short, long, help = "Pipeline module to run: extract, merge, scrna or receipt")]
    pub module: String,

    #[arg(short = 'v', long = "verbose", action, help = "Show more output, set log level to debug")]
    pub verbose: bool,

    #[arg(short = 'i', long = "input", help = "Source directory of fastq (extract/merge), sam (scrna) or tsv (receipt) files")]
    pub input: Option<String>,

    #[arg(short = 'o', long = "output", help = "Output directory for final files; a single combined tsv path in receipt mode")]
    pub output: Option<String>,

    #[arg(short = 'p', long = "pipeline", default_value = "./pipeline", help = "Directory for intermediate pipeline files")]
    pub pipeline: String,

    #[arg(short = 's', long = "samples", help = "Comma separated list of samples to process")]
    pub samples: Option<String>,

    #[arg(long = "log-file", help = "Path to log file [default: <pipeline-dir>/barseq.log]")]
    pub log_file: Option<String>,

    #[arg(short = 'y', long = "yes", action, help = "Answer yes to prompts")]
    pub yes: bool,

    #[arg(short = 't', long, default_value_t = 1, help = "Number of cpu cores forwarded to external tools")]
    pub threads: usize,

    #[arg(short = 'q', long = "quality", default_value_t = 30, help = "Minimum PHRED quality for filtering reads")]
    pub quality: u8,

    #[arg(short = 'u', long = "unqualified-percent", default_value_t = 20, help = "Percent of bases allowed below the quality threshold")]
    pub unqualified_percent: u8,

    #[arg(short = 'e', long = "error", default_value_t = 0.1, help = "Error tolerance supplied to cutadapt")]
    pub error: f64,

    #[arg(short = 'l', long = "length", default_value_t = 20, help = "Target length of extracted barcode")]
    pub length: u32,

    #[arg(long = "upstream-adapter", default_value = "GTGGAAAGGACGAAACACCG", help = "5' sequence flanking the barcode")]
    pub upstream_adapter: String,

    #[arg(long = "downstream-adapter", default_value = "GTTTTAGAGCTAGAAATAGC", help = "3' sequence flanking the barcode")]
    pub downstream_adapter: String,

    #[arg(long = "unlinked-adapters", action, help = "Run cutadapt using unlinked adapters")]
    pub unlinked_adapters: bool,

    #[arg(long = "skip-trimming", action, help = "Skip cutadapt trimming entirely and use reads as-is")]
    pub skip_trimming: bool,

    #[arg(short = 'r', long = "ratio", default_value_t = 3.0, help = "Ratio to use for message passing clustering")]
    pub ratio: f64,

    #[arg(short = 'd', long = "distance", default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=8), help = "Levenshtein distance for clustering")]
    pub distance: u8,

    #[arg(long = "filter-count", help = "Minimum nominal number of reads")]
    pub filter_count: Option<u64>,

    #[arg(long = "filter-percent", help = "Minimum percentage of total reads [default: 0.005]")]
    pub filter_percent: Option<f64>,

    #[arg(long = "offset", default_value_t = 1, help = "Length offset from target barcode length post-clustering")]
    pub offset: u32,

    #[arg(long = "minimum-length", default_value_t = 10, help = "Minimum length of extracted barcode (scrna)")]
    pub minimum_length: u32,

    #[arg(long = "fastp-args", help = "Additional arguments passed to fastp")]
    pub fastp_args: Option<String>,

    #[arg(long = "cutadapt-args", default_value = "--max-n=0 -n 2 --trimmed-only", help = "Additional arguments passed to cutadapt")]
    pub cutadapt_args: String,

    #[arg(long = "no-overlap", action, help = "Skip per lineage overlap columns in receipt")]
    pub no_overlap: bool,
}
