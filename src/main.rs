// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kzaudio::audio::{mock, AudioDescriptor, AudioFormat, AudioSource, StreamingEngine};
use kzaudio::config::Settings;

/// Samples decoded per read by the `decode` command.
const DECODE_CHUNK: usize = 64 * 1024;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Decodes and streams WAV and Ogg/Vorbis audio."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Prints the format and stream description of an audio file.
    Info {
        /// The audio file to inspect.
        file: PathBuf,
        /// The output format of the report.
        #[arg(short, long, value_enum, default_value = "yaml")]
        format: ReportFormat,
    },
    /// Decodes an audio file to raw little-endian 16-bit PCM.
    Decode {
        /// The audio file to decode.
        file: PathBuf,
        /// Where to write the raw samples.
        out: PathBuf,
    },
    /// Streams an audio file through a simulated device and logs each tick.
    Simulate {
        /// The audio file to stream.
        file: PathBuf,
        /// The number of ticks to run. Each tick plays one buffer.
        #[arg(short, long, default_value_t = 10)]
        ticks: u32,
        /// Stop at the end of the file instead of looping.
        #[arg(long)]
        no_loop: bool,
        /// A YAML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct Report<'a> {
    path: &'a Path,
    format: AudioFormat,
    duration_ms: u128,
    descriptor: AudioDescriptor,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { file, format } => {
            let source = AudioSource::open(&file)?;
            let descriptor = source.describe();
            let report = Report {
                path: &file,
                format: source.format(),
                duration_ms: descriptor.length().as_millis(),
                descriptor,
            };
            match format {
                ReportFormat::Yaml => print!("{}", serde_yml::to_string(&report)?),
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
        }
        Commands::Decode { file, out } => {
            let mut source = AudioSource::open(&file)?;
            let mut writer = BufWriter::new(File::create(&out)?);
            let mut chunk = vec![0i16; DECODE_CHUNK];
            let mut total = 0usize;
            loop {
                let count = source.read(&mut chunk);
                if count == 0 {
                    break;
                }
                for sample in &chunk[..count] {
                    writer.write_all(&sample.to_le_bytes())?;
                }
                total += count;
            }
            writer.flush()?;
            info!(path = ?out, samples = total, "Decoded");
        }
        Commands::Simulate {
            file,
            ticks,
            no_loop,
            config,
        } => {
            let settings = Settings::load(config.as_deref())?;
            let mut stream_settings = settings.streaming().to_settings()?;
            if no_loop {
                stream_settings.loop_enabled = false;
            }

            let backend = Arc::new(mock::Backend::new("simulator"));
            let source = AudioSource::open(&file)?;
            let mut engine = StreamingEngine::open(backend.clone(), source, &stream_settings)?;
            engine.play()?;

            for tick in 1..=ticks {
                backend.consume(engine.voice(), 1);
                let report = engine.tick()?;
                info!(
                    tick,
                    processed = report.processed,
                    refilled = report.refilled,
                    restarted = report.restarted,
                    exhausted = engine.is_exhausted(),
                    playing = engine.is_playing(),
                    "Tick"
                );
            }
            engine.stop()?;
            info!(uploads = backend.uploads().len(), "Simulation finished");
        }
    }

    Ok(())
}
