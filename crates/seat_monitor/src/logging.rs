//! Logger setup: `timestamp - LEVEL - message` lines on stdout and in a log file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use env_logger::{Builder, Env, Target};

/// Writes every line to stdout and to an append-only file.
struct Tee {
    stdout: io::Stdout,
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stdout.write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()?;
        self.file.flush()
    }
}

fn builder() -> Builder {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            record.level(),
            record.args()
        )
    });
    builder
}

/// Install the global logger, appending to `log_file` as well as stdout.
pub fn init(log_file: &Path) -> io::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;

    let mut builder = builder();
    builder.target(Target::Pipe(Box::new(Tee {
        stdout: io::stdout(),
        file,
    })));
    builder.init();
    Ok(())
}

/// Install a stdout-only logger, for when the log file cannot be opened.
pub fn init_stdout() {
    builder().init();
}
