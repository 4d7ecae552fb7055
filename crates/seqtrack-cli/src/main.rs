//! Entry point for the `seqtrack` binary.

fn main() {
    std::process::exit(seqtrack_cli::run());
}
