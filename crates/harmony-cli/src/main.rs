//! harmony: play chord progressions with smooth voice leading

mod config;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use harmony_core::{
    pitch_to_note_name, Articulation, ChordSpec, DrumConfig, DrumPattern, Mode, Pitch,
    PlaybackRequest, ProgressionPayload, Tonic, Voicer,
};
use harmony_services::{
    render_to_wav, DrumKitParams, GenerationClient, GenerationParams, Instrument, LiveOutput,
    PlaybackEvent, Player, PlayerConfig, RecordingInstrument, RenderOptions, SynthParams,
};
use structopt::StructOpt;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::AppConfig;

#[derive(Debug, StructOpt)]
#[structopt(name = "harmony", about = "Chord progression player")]
struct Opt {
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: usize,

    /// Config file to use instead of the default location
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Play a progression through the default audio device
    Play {
        #[structopt(flatten)]
        source: Source,

        /// Fraction of each chord's slot that sounds, in (0, 1]
        #[structopt(long)]
        articulation: Option<f64>,

        /// Print the chords without opening an audio device
        #[structopt(long)]
        dry_run: bool,
    },
    /// Render a progression to a WAV file
    Render {
        #[structopt(flatten)]
        source: Source,

        #[structopt(long)]
        articulation: Option<f64>,

        #[structopt(short, long, parse(from_os_str))]
        output: PathBuf,

        #[structopt(long)]
        sample_rate: Option<u32>,
    },
    /// Print voice-led note names for a list of chord symbols
    Voice {
        symbols: Vec<String>,

        #[structopt(short, long)]
        key: Option<String>,

        #[structopt(short, long)]
        mode: Option<Mode>,
    },
}

/// Where the progression comes from, plus per-run overrides
#[derive(Debug, StructOpt)]
struct Source {
    /// Chord symbols, e.g. `I vi IV V`
    symbols: Vec<String>,

    /// JSON progression payload
    #[structopt(short, long, parse(from_os_str))]
    file: Option<PathBuf>,

    /// Ask the generation service for a progression
    #[structopt(short, long)]
    generate: bool,

    /// Seed progression for the generation service, e.g. `I-vi-IV`
    #[structopt(long)]
    seed: Option<String>,

    /// Number of chords to generate
    #[structopt(long)]
    length: Option<usize>,

    /// Beats per chord for symbols given on the command line
    #[structopt(short, long, default_value = "1.0")]
    beats: f64,

    #[structopt(short, long)]
    tempo: Option<f64>,

    #[structopt(short, long)]
    key: Option<String>,

    #[structopt(short, long)]
    mode: Option<Mode>,

    /// Drum pattern: basic, rock or jazz
    #[structopt(long)]
    drums: Option<DrumPattern>,

    #[structopt(long)]
    no_drums: bool,
}

fn init_logging(verbose: usize) {
    let default = match verbose {
        0 => "harmony=info",
        1 => "harmony=debug",
        _ => "harmony=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    init_logging(opt.verbose);

    let path = opt.config.clone().unwrap_or_else(config::config_path);
    let config = config::load_config(&path);
    debug!(path = %path.display(), ?config, "Loaded config");

    match opt.command {
        Command::Play {
            source,
            articulation,
            dry_run,
        } => {
            let request = build_request(&source, &config)?;
            let player = player_config(articulation, &config)?;
            if dry_run {
                play(RecordingInstrument::new(), player, request)
            } else {
                let synth = synth_params(&config);
                let release = Duration::from_secs_f64(synth.release);
                let output = LiveOutput::open(synth, DrumKitParams::default())
                    .context("Failed to open audio output")?;
                info!(sample_rate = output.sample_rate(), "Audio output ready");
                play(output.rack(), player, request)?;
                // Let the last chord's release ring out
                std::thread::sleep(release);
                output.stop();
                Ok(())
            }
        }
        Command::Render {
            source,
            articulation,
            output,
            sample_rate,
        } => {
            let request = build_request(&source, &config)?;
            let options = RenderOptions {
                player: player_config(articulation, &config)?,
                synth: synth_params(&config),
                drums: DrumKitParams::default(),
                sample_rate: sample_rate.unwrap_or(config.render.sample_rate),
                tail: Duration::try_from_secs_f64(config.render.tail_secs.max(0.0))
                    .context("render.tail_secs is out of range")?,
            };
            let summary = render_to_wav(request, &options, &output)
                .with_context(|| format!("Failed to render {}", output.display()))?;
            println!(
                "Wrote {} ({} chords, {} drum steps, {:.2}s)",
                output.display(),
                summary.chords,
                summary.drum_steps,
                summary.duration().as_secs_f64()
            );
            Ok(())
        }
        Command::Voice { symbols, key, mode } => {
            let mode = mode.unwrap_or(config.playback.mode);
            let tonic = Tonic::parse(key.as_deref().unwrap_or(&config.playback.tonic), mode)?;
            print_voicing(&symbols, &tonic)
        }
    }
}

fn player_config(articulation: Option<f64>, config: &AppConfig) -> Result<PlayerConfig> {
    let ratio = articulation.unwrap_or(config.playback.articulation);
    Ok(PlayerConfig {
        articulation: Articulation::new(ratio)?,
    })
}

fn synth_params(config: &AppConfig) -> SynthParams {
    SynthParams {
        cutoff_hz: config.audio.cutoff_hz,
        master_db: config.audio.master_db,
        ..SynthParams::default()
    }
}

fn build_request(source: &Source, config: &AppConfig) -> Result<PlaybackRequest> {
    let mut payload = if let Some(path) = &source.file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str::<ProgressionPayload>(&text)
            .with_context(|| format!("Invalid progression in {}", path.display()))?
    } else if source.generate {
        let client = GenerationClient::new(config.generation.url.as_str());
        let seed = match (&source.seed, source.symbols.is_empty()) {
            (Some(seed), _) => seed.clone(),
            (None, false) => source.symbols.join("-"),
            (None, true) => config.generation.seed.clone(),
        };
        let params = GenerationParams {
            seed,
            length: source.length.unwrap_or(config.generation.length),
            temperature: config.generation.temperature,
        };
        let mut payload = client.generate(&params).context("Progression generation failed")?;
        payload.tempo = config.playback.tempo;
        payload
    } else if !source.symbols.is_empty() {
        ProgressionPayload {
            chords: source
                .symbols
                .iter()
                .map(|symbol| ChordSpec::symbolic(symbol.as_str(), source.beats))
                .collect(),
            tempo: config.playback.tempo,
            ..Default::default()
        }
    } else {
        bail!("Nothing to play: give chord symbols, --file or --generate");
    };

    if let Some(tempo) = source.tempo {
        payload.tempo = tempo;
    }
    if let Some(key) = &source.key {
        payload.tonic = Some(key.clone());
    }
    if let Some(mode) = source.mode {
        payload.mode = Some(mode);
    }
    payload.tonic.get_or_insert_with(|| config.playback.tonic.clone());
    payload.mode.get_or_insert(config.playback.mode);

    let drums = if source.no_drums {
        DrumConfig::disabled()
    } else if let Some(pattern) = source.drums {
        DrumConfig::enabled(pattern)
    } else if let Some(drums) = payload.drums {
        drums
    } else if config.playback.drums {
        DrumConfig::enabled(config.playback.pattern)
    } else {
        DrumConfig::disabled()
    };
    payload.drums = Some(drums);

    Ok(PlaybackRequest::from_payload(payload)?)
}

fn note_names(pitches: &[Pitch]) -> String {
    pitches
        .iter()
        .map(|p| pitch_to_note_name(*p).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn play<I: Instrument + 'static>(instrument: I, config: PlayerConfig, request: PlaybackRequest) -> Result<()> {
    println!(
        "Playing {} chords in {} at {} BPM",
        request.len(),
        request.tonic,
        request.tempo.bpm()
    );

    let player = Player::spawn(instrument, config)?;
    let session = player.start(request)?;

    loop {
        let event = player
            .events()
            .recv()
            .context("Playback stopped unexpectedly")?;
        if event.session() != session {
            continue;
        }
        match event {
            PlaybackEvent::Started { .. } => {}
            PlaybackEvent::ChordAttacked {
                index,
                symbol,
                pitches,
                ..
            } => println!("{:>3}  {:<6} {}", index + 1, symbol, note_names(&pitches)),
            PlaybackEvent::Completed { .. } => return Ok(()),
            PlaybackEvent::Aborted { .. } => {
                println!("Stopped");
                return Ok(());
            }
            PlaybackEvent::Failed { error, .. } => bail!(error),
        }
    }
}

fn print_voicing(symbols: &[String], tonic: &Tonic) -> Result<()> {
    println!("Key of {tonic}");
    let mut voicer = Voicer::new();
    for symbol in symbols {
        let chord = ChordSpec::symbolic(symbol.as_str(), 1.0).resolve(tonic)?;
        let voiced = voicer.voice(&chord.pitches);
        println!(
            "{:<6} {:<12} -> {}",
            symbol,
            note_names(&chord.pitches),
            note_names(&voiced)
        );
    }
    Ok(())
}
