use heatmap_core::codec;
use heatmap_core::config::HeatmapConfig;
use heatmap_core::heatmap::{GenericHeatmap, make_heatmap};
use heatmap_core::mutator::{CompressedImageMutator, Mutator};

use clap::{Parser, Subcommand};
use log::{debug, info};
use rand_chacha::ChaCha8Rng;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long, value_parser)]
    config_file: Option<PathBuf>,
    /// Overrides the seed from the configuration.
    #[clap(short, long)]
    seed: Option<u64>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the interesting segments of a file.
    Scan { path: PathBuf },
    /// Print offsets chosen by the heatmap of a file, one per line.
    Sample {
        path: PathBuf,
        #[clap(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Mutate a file at heatmap-chosen offsets.
    Mutate {
        path: PathBuf,
        #[clap(short, long)]
        output: PathBuf,
        /// Treat the file as a gzip-compressed image.
        #[clap(long)]
        compressed: bool,
    },
    /// gzip-compress a file.
    Compress { input: PathBuf, output: PathBuf },
    /// Decompress a gzip file.
    Decompress { input: PathBuf, output: PathBuf },
    /// Base64-encode a file.
    EncodeB64 { input: PathBuf, output: PathBuf },
    /// Base64-decode a file.
    DecodeB64 { input: PathBuf, output: PathBuf },
}

fn load_config(config_file: Option<PathBuf>) -> Result<HeatmapConfig, anyhow::Error> {
    match config_file {
        Some(config_path) => {
            info!("Loading configuration from specified path: {config_path:?}");
            Ok(HeatmapConfig::load_from_file(&config_path)?)
        }
        None => {
            let default_config_path = PathBuf::from("heatmap.toml");
            if default_config_path.exists() {
                info!("No config file specified, loading default: {default_config_path:?}");
                Ok(HeatmapConfig::load_from_file(&default_config_path)?)
            } else {
                debug!("No config file specified and 'heatmap.toml' not found, using defaults");
                Ok(HeatmapConfig::default())
            }
        }
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>, anyhow::Error> {
    std::fs::read(path).map_err(|e| anyhow::anyhow!("Failed to read {path:?}: {e}"))
}

fn write_output(path: &Path, data: &[u8]) -> Result<(), anyhow::Error> {
    std::fs::write(path, data).map_err(|e| anyhow::anyhow!("Failed to write {path:?}: {e}"))
}

fn read_non_empty(path: &Path) -> Result<Vec<u8>, anyhow::Error> {
    let data = read_input(path)?;
    if data.is_empty() {
        anyhow::bail!("{path:?} is empty, there is no offset to choose");
    }
    Ok(data)
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = load_config(cli.config_file)?;
    if let Some(seed) = cli.seed {
        config.rng.seed = seed;
    }
    debug!("Effective configuration: {config:#?}");

    let mut rng = config.seeded_rng();

    match cli.command {
        Command::Scan { path } => {
            let data = read_input(&path)?;
            print!("{}", GenericHeatmap::new(&data));
        }
        Command::Sample { path, count } => {
            let data = read_non_empty(&path)?;
            let heatmap = make_heatmap(config.sampler.heatmap, &data);
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for _ in 0..count {
                writeln!(out, "{}", heatmap.choose_location(&mut rng))?;
            }
        }
        Command::Mutate {
            path,
            output,
            compressed,
        } => {
            let data = read_input(&path)?;
            let heatmap_mutator = config.heatmap_mutator();
            let mut mutator: Box<dyn Mutator<Vec<u8>, ChaCha8Rng>> =
                if compressed || config.mutator.compressed {
                    Box::new(CompressedImageMutator::new(heatmap_mutator))
                } else {
                    Box::new(heatmap_mutator)
                };

            let mutated = mutator.mutate(Some(&data), &mut rng)?;
            write_output(&output, &mutated)?;
            info!(
                "Wrote {} bytes to {:?} (md5 {:x})",
                mutated.len(),
                output,
                md5::compute(&mutated)
            );
        }
        Command::Compress { input, output } => {
            let compressed = codec::compress(&read_input(&input)?)?;
            write_output(&output, &compressed)?;
            info!("Compressed {input:?} into {} bytes", compressed.len());
        }
        Command::Decompress { input, output } => {
            let compressed = read_input(&input)?;
            let file = File::create(&output)
                .map_err(|e| anyhow::anyhow!("Failed to create {output:?}: {e}"))?;
            let mut writer = BufWriter::new(file);
            let written = codec::decompress_into(&compressed, &mut writer)?;
            info!("Decompressed {input:?} into {written} bytes");
        }
        Command::EncodeB64 { input, output } => {
            write_output(&output, &codec::encode_b64(&read_input(&input)?))?;
        }
        Command::DecodeB64 { input, output } => {
            write_output(&output, &codec::decode_b64(&read_input(&input)?)?)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_subcommands_use_kebab_case_names() {
        let cli = Cli::try_parse_from(["heatmap_cli", "encode-b64", "in.bin", "out.b64"])
            .expect("encode-b64 should parse");
        match cli.command {
            Command::EncodeB64 { input, output } => {
                assert_eq!(input, PathBuf::from("in.bin"));
                assert_eq!(output, PathBuf::from("out.b64"));
            }
            other => panic!("Expected EncodeB64, got {:?}", other),
        }

        let cli = Cli::try_parse_from(["heatmap_cli", "decode-b64", "in.b64", "out.bin"])
            .expect("decode-b64 should parse");
        assert!(matches!(cli.command, Command::DecodeB64 { .. }));
    }

    #[test]
    fn global_options_parse_before_subcommand() {
        let cli = Cli::try_parse_from(["heatmap_cli", "--seed", "7", "sample", "data.bin", "-n", "3"])
            .unwrap();
        assert_eq!(cli.seed, Some(7));
        match cli.command {
            Command::Sample { path, count } => {
                assert_eq!(path, PathBuf::from("data.bin"));
                assert_eq!(count, 3);
            }
            other => panic!("Expected Sample, got {:?}", other),
        }
    }
}
