//! swiftmon CLI
//!
//! Runs the Swift XRT reduction workflows from the command line. HEASoft
//! (and PRESTO for folding) must be on `PATH`.
#![allow(clippy::too_many_lines)]

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use swiftmon_core::{ChannelRange, Region, SpectralBand};
use swiftmon_io::Workspace;
use swiftmon_tools::{
    correct_backscal, extract, extract_spectrum, find_centroid, make_expomap, make_wt_regions,
    get_toas, prepfold, split_by_gti, stack_spectra, swiftfold, CentroidSource, ExposureMapOptions, ExtractOptions,
    RegionFilter, ShellRunner, SpectrumOptions, WtRegionFiles, DEFAULT_GROUPING,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FITS error: {0}")]
    Fits(#[from] swiftmon_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] swiftmon_core::Error),

    #[error("{0}")]
    Tools(#[from] swiftmon_tools::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Spectral and timing reduction for Swift XRT pulsar monitoring.
#[derive(Parser)]
#[command(name = "swiftmon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory the tools run in; relative paths are resolved against it
    #[arg(short = 'C', long, global = true, default_value = ".")]
    workdir: PathBuf,

    /// Prefix for scratch files, for concurrent runs in one directory
    #[arg(long, global = true, default_value = "")]
    namespace: String,

    /// Print the produced files as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// PI channel bounds.
#[derive(Args, Debug)]
struct ChannelArgs {
    /// Lowest PI channel
    #[arg(long, requires = "chan_high")]
    chan_low: Option<u32>,

    /// Highest PI channel
    #[arg(long, requires = "chan_low")]
    chan_high: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the event extractor once
    Extract {
        /// Input event file
        input: PathBuf,

        /// Root of the output file names
        #[arg(short, long)]
        output_root: String,

        /// Do not write a filtered event file
        #[arg(long)]
        no_events: bool,

        /// Write an image (.img)
        #[arg(long)]
        image: bool,

        /// Write a spectrum (.pha)
        #[arg(long)]
        spectrum: bool,

        /// Write a binned light curve (.lc)
        #[arg(long)]
        lightcurve: bool,

        /// Region file to filter on
        #[arg(long)]
        region: Option<PathBuf>,

        /// Grade selection, e.g. 0 or 0-2
        #[arg(long)]
        grade: Option<String>,

        /// GTI file restricting the time range
        #[arg(long)]
        gti_file: Option<PathBuf>,

        #[command(flatten)]
        channels: ChannelArgs,
    },

    /// Locate the source at the brightest pixel
    Centroid {
        /// Event file, or an image with --image
        input: PathBuf,

        /// Treat the input as an existing image
        #[arg(long)]
        image: bool,
    },

    /// Extract a grouped source spectrum with background, ARF and RMF
    Spectrum {
        /// Input event file
        input: PathBuf,

        /// Root of the output file names
        #[arg(short, long)]
        output_root: String,

        #[command(flatten)]
        channels: ChannelArgs,

        /// Lower energy bound (keV)
        #[arg(long, requires = "energy_high", conflicts_with_all = ["chan_low", "chan_high"])]
        energy_low: Option<f64>,

        /// Upper energy bound (keV)
        #[arg(long, requires = "energy_low")]
        energy_high: Option<f64>,

        /// Minimum counts per grouped bin
        #[arg(long, default_value_t = DEFAULT_GROUPING, conflicts_with = "no_grouping")]
        grouping: u32,

        /// Leave the spectrum ungrouped
        #[arg(long)]
        no_grouping: bool,

        /// Exposure map for the ARF
        #[arg(long)]
        expomap: Option<PathBuf>,

        /// Source region file
        #[arg(long)]
        source_region: Option<PathBuf>,

        /// Background region file
        #[arg(long)]
        back_region: Option<PathBuf>,

        /// Grade selection; tags outputs with _g<grade>
        #[arg(long)]
        grade: Option<String>,
    },

    /// Split an event file into one file per good time interval
    SplitGti {
        /// Input event file
        input: PathBuf,
    },

    /// Sum spectra with exposure-weighted responses
    Stack {
        /// Spectra to stack
        #[arg(required = true)]
        spectra: Vec<PathBuf>,

        /// Root of the output file names
        #[arg(short, long)]
        output_root: String,

        /// Minimum counts per grouped bin
        #[arg(long)]
        grouping: Option<u32>,
    },

    /// Set BACKSCAL for default WT-mode regions
    Backscal {
        /// Source spectrum
        source_spectrum: PathBuf,

        /// Background spectrum
        back_spectrum: PathBuf,

        /// Source region file (circle)
        #[arg(long, default_value = swiftmon_tools::SOURCE_REGION_FILE)]
        source_region: PathBuf,

        /// Background region file (annulus)
        #[arg(long, default_value = swiftmon_tools::BACKGROUND_REGION_FILE)]
        back_region: PathBuf,
    },

    /// Write default WT-mode source and background regions
    WtRegions {
        /// Input event file
        events: PathBuf,

        /// Source circle radius (pixels)
        #[arg(long, default_value = "20.0")]
        source_radius: f64,

        /// Half width of the background annulus around 100 pixels
        #[arg(long, default_value = "20.0")]
        back_width: f64,

        /// Source region output file
        #[arg(long, default_value = swiftmon_tools::SOURCE_REGION_FILE)]
        source_file: PathBuf,

        /// Background region output file
        #[arg(long, default_value = swiftmon_tools::BACKGROUND_REGION_FILE)]
        back_file: PathBuf,
    },

    /// Make an exposure map
    Expomap {
        /// Cleaned event file
        events: PathBuf,

        /// Attitude file
        #[arg(long)]
        attfile: PathBuf,

        /// Housekeeping header packets file
        #[arg(long)]
        hdfile: PathBuf,

        /// Output stem (default: event file stem)
        #[arg(long)]
        stem: Option<String>,

        /// Output directory
        #[arg(long)]
        outdir: Option<PathBuf>,
    },

    /// Fold a barycentred time series with prepfold
    Fold {
        /// PRESTO .dat time series
        datfile: PathBuf,

        /// Timing ephemeris
        #[arg(long)]
        par: PathBuf,

        /// Number of profile bins
        #[arg(short = 'n', long, default_value = "32")]
        bins: u32,
    },

    /// Fold region-filtered events at a fixed frequency with swiftfold
    Swiftfold {
        /// Region-filtered event file
        events: PathBuf,

        /// Output root; the profile is written to <ROOT>.fold
        #[arg(short, long)]
        output: String,

        /// Spin frequency in Hz
        #[arg(short, long)]
        frequency: f64,

        /// Reference epoch (MJD)
        #[arg(short, long)]
        epoch: f64,

        /// Number of profile bins
        #[arg(short = 'n', long, default_value = "32")]
        bins: u32,
    },

    /// Measure times of arrival against a profile template
    Toas {
        /// PRESTO .dat time series
        datfile: PathBuf,

        /// Profile template
        #[arg(short, long)]
        template: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn channel_range(args: &ChannelArgs) -> Result<Option<ChannelRange>> {
    match (args.chan_low, args.chan_high) {
        (Some(low), Some(high)) => Ok(Some(ChannelRange::new(low, high)?)),
        _ => Ok(None),
    }
}

/// Prints `value` as JSON, or the human-readable `lines` otherwise.
fn report<T: Serialize>(json: bool, value: &T, lines: Vec<String>) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        for line in lines {
            println!("{line}");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let workspace = Workspace::new(&cli.workdir).with_namespace(&cli.namespace);
    let runner = ShellRunner::new();
    let json = cli.json;

    match cli.command {
        Commands::Extract {
            input,
            output_root,
            no_events,
            image,
            spectrum,
            lightcurve,
            region,
            grade,
            gti_file,
            channels,
        } => {
            let mut options = ExtractOptions::default()
                .with_events(!no_events)
                .with_image(image)
                .with_spectrum(spectrum)
                .with_lightcurve(lightcurve)
                .with_region(region.map(RegionFilter::File))
                .with_grade(grade)
                .with_channels(channel_range(&channels)?.unwrap_or_else(ChannelRange::full));
            if let Some(gti) = gti_file {
                options = options.with_gti_file(gti);
            }

            let products = extract(&workspace, &runner, &output_root, &input, &options)?;
            let lines = products
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            report(json, &products, lines)?;
        }

        Commands::Centroid { input, image } => {
            let source = if image {
                CentroidSource::Image(input)
            } else {
                CentroidSource::Events(input)
            };
            let centroid = find_centroid(&workspace, &runner, &source)?;
            report(json, &centroid, vec![format!("{} {}", centroid.x, centroid.y)])?;
        }

        Commands::Spectrum {
            input,
            output_root,
            channels,
            energy_low,
            energy_high,
            grouping,
            no_grouping,
            expomap,
            source_region,
            back_region,
            grade,
        } => {
            let band = match (channel_range(&channels)?, energy_low, energy_high) {
                (Some(range), _, _) => SpectralBand::Channels(range),
                (None, Some(low_kev), Some(high_kev)) => SpectralBand::Energy { low_kev, high_kev },
                _ => SpectralBand::Full,
            };
            let mut options = SpectrumOptions::default()
                .with_band(band)
                .with_grouping((!no_grouping).then_some(grouping));
            if let Some(map) = expomap {
                options = options.with_exposure_map(map);
            }
            if let Some(region) = source_region {
                options = options.with_source_region(region);
            }
            if let Some(region) = back_region {
                options = options.with_background_region(region);
            }
            if let Some(grade) = grade {
                options = options.with_grade(grade);
            }

            let products = extract_spectrum(&workspace, &runner, &output_root, &input, &options)?;
            info!(rmf = %products.rmf, "spectrum ready");
            let lines = vec![
                format!("source:     {}", products.source.display()),
                format!("background: {}", products.background.display()),
                format!("arf:        {}", products.arf.display()),
                format!("rmf:        {}", products.rmf),
                format!("centroid:   {}", products.centroid),
            ];
            report(json, &products, lines)?;
        }

        Commands::SplitGti { input } => {
            let partition = split_by_gti(&workspace, &runner, &input)?;
            let lines = partition
                .intervals
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            report(json, &partition, lines)?;
        }

        Commands::Stack {
            spectra,
            output_root,
            grouping,
        } => {
            let stacked = stack_spectra(&workspace, &runner, &spectra, &output_root, grouping)?;
            let mut lines = vec![
                format!("spectrum:   {}", stacked.spectrum.display()),
                format!("background: {}", stacked.background.display()),
                format!("response:   {}", stacked.response.display()),
                format!("exposure:   {} s", stacked.exposure()),
            ];
            lines.extend(
                spectra
                    .iter()
                    .zip(stacked.weights.weights())
                    .map(|(spectrum, weight)| format!("  {weight:.4}  {}", spectrum.display())),
            );
            report(json, &stacked, lines)?;
        }

        Commands::Backscal {
            source_spectrum,
            back_spectrum,
            source_region,
            back_region,
        } => {
            let source = Region::read(workspace.resolve(&source_region))?;
            let background = Region::read(workspace.resolve(&back_region))?;
            let scale = correct_backscal(
                &workspace.resolve(&source_spectrum),
                &workspace.resolve(&back_spectrum),
                &source,
                &background,
            )?;
            let lines = vec![
                format!("source BACKSCAL:     {}", scale.source),
                format!("background BACKSCAL: {}", scale.background),
            ];
            report(json, &scale, lines)?;
        }

        Commands::WtRegions {
            events,
            source_radius,
            back_width,
            source_file,
            back_file,
        } => {
            let files = WtRegionFiles {
                source: source_file,
                background: back_file,
            };
            let regions =
                make_wt_regions(&workspace, &runner, &events, source_radius, back_width, &files)?;
            let lines = vec![
                format!("{}: {}", regions.source_file.display(), regions.source),
                format!("{}: {}", regions.background_file.display(), regions.background),
            ];
            report(json, &regions, lines)?;
        }

        Commands::Expomap {
            events,
            attfile,
            hdfile,
            stem,
            outdir,
        } => {
            let mut options = ExposureMapOptions::new(events, attfile, hdfile);
            if let Some(stem) = stem {
                options = options.with_stem(stem);
            }
            if let Some(outdir) = outdir {
                options = options.with_outdir(outdir);
            }
            let map = make_expomap(&workspace, &runner, &options)?;
            report(json, &map, vec![map.image.display().to_string()])?;
        }

        Commands::Fold { datfile, par, bins } => {
            let output = prepfold(&workspace, &runner, &datfile, &par, bins)?;
            let summary = serde_json::json!({
                "datfile": datfile,
                "parfile": par,
                "bins": bins,
                "elapsed_secs": output.elapsed_secs(),
            });
            report(
                json,
                &summary,
                vec![format!("folded in {:.1} s", output.elapsed_secs())],
            )?;
        }

        Commands::Swiftfold {
            events,
            output,
            frequency,
            epoch,
            bins,
        } => {
            let profile = swiftfold(&workspace, &runner, &events, &output, frequency, epoch, bins)?;
            report(json, &profile, vec![profile.display().to_string()])?;
        }

        Commands::Toas { datfile, template } => {
            let toas = get_toas(&workspace, &runner, &datfile, &template)?;
            report(json, &toas, toas.clone())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_channel_and_energy_conflict() {
        let parsed = Cli::try_parse_from([
            "swiftmon", "spectrum", "obs.evt", "-o", "obs", "--chan-low", "30", "--chan-high",
            "1000", "--energy-low", "0.3", "--energy-high", "10",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "swiftmon", "split-gti", "obs.evt", "--workdir", "/data/obs", "--namespace", "a_",
            "--json", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.workdir, PathBuf::from("/data/obs"));
        assert_eq!(cli.namespace, "a_");
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_channel_range_parsing() {
        let cli = Cli::try_parse_from([
            "swiftmon", "extract", "obs.evt", "-o", "soft", "--chan-low", "30", "--chan-high", "200",
        ])
        .unwrap();
        let Commands::Extract { channels, .. } = cli.command else {
            panic!("expected extract");
        };
        let range = channel_range(&channels).unwrap().unwrap();
        assert_eq!((range.low(), range.high()), (30, 200));
    }

    #[test]
    fn test_swiftfold_arguments() {
        let cli = Cli::try_parse_from([
            "swiftmon", "swiftfold", "obs_reg.evt", "-o", "obs", "-f", "0.1432858", "-e",
            "55123.5", "-n", "16",
        ])
        .unwrap();
        let Commands::Swiftfold {
            output,
            frequency,
            bins,
            ..
        } = cli.command
        else {
            panic!("expected swiftfold");
        };
        assert_eq!(output, "obs");
        assert!((frequency - 0.143_285_8).abs() < 1e-12);
        assert_eq!(bins, 16);
    }

    #[test]
    fn test_centroid_input_kind() {
        assert!(Cli::try_parse_from(["swiftmon", "centroid"]).is_err());
        let cli = Cli::try_parse_from(["swiftmon", "centroid", "--image", "obs.img"]).unwrap();
        assert!(matches!(cli.command, Commands::Centroid { image: true, .. }));
    }
}
