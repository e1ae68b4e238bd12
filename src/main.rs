#[cfg(feature = "cli")]
mod cli;

#[cfg(feature = "cli")]
fn main() {
    use std::error::Error as _;

    if let Err(err) = cli::run() {
        eprintln!("error: {err}");
        let mut cause = err.source();
        while let Some(inner) = cause {
            eprintln!("  caused by: {inner}");
            cause = inner.source();
        }
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("hanzigloss was built without its command line. Rebuild with `--features cli` to enable it.");
}
