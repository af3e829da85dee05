//! Command-line front end for [`unxz_core`]: opens the input and output
//! files (or stdin/stdout, or the null sink under `--fuzz-mode`) and hands
//! them to the decoder. None of this is part of the core — see the crate's
//! module docs for where the boundary is drawn.

use std::{
    fs::File,
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "unxz",
    author,
    version,
    about = "Decompress a single .xz (LZMA2) or .lzma stream to stdout or a file"
)]
struct Cli {
    /// Input file to decompress.
    #[arg(short, long)]
    file: PathBuf,

    /// Output file; defaults to standard output.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Discard all output instead of writing it; used for fuzzing without
    /// touching disk.
    #[arg(long, visible_aliases = ["fuzz-mode", "fuzzing"])]
    chaos: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let input = match File::open(&cli.file) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("unxz: cannot open {}: {e}", cli.file.display());
            return ExitCode::from(1);
        }
    };

    let result = if cli.chaos {
        eprintln!("fuzz-mode enabled, preparing for chaos");
        unxz_core::decompress(input, io::sink())
    } else {
        match cli.output {
            Some(path) => match File::create(&path) {
                Ok(out) => unxz_core::decompress(input, out),
                Err(e) => {
                    eprintln!("unxz: cannot create {}: {e}", path.display());
                    return ExitCode::from(1);
                }
            },
            None => unxz_core::decompress(input, io::stdout().lock()),
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let _ = writeln!(io::stderr(), "unxz: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
