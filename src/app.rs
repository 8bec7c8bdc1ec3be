use crate::cli::{Cli, Commands, EncodeArgs};
use ffslide::{config, engine};
use std::io::Write;
use std::process;
use std::sync::Arc;
use std::time::Duration;

pub fn run(cli: Cli) {
    match cli.command {
        Commands::Encode(args) => handle_encode(args),
        Commands::DryRun(args) => handle_dry_run(args),
        Commands::Probe { file } => handle_probe(file),
        Commands::CheckFfmpeg => handle_check_ffmpeg(),
        Commands::InitConfig => handle_init_config(),
    }
}

fn load_config() -> config::Config {
    config::Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: {:#}; using built-in defaults", e);
        config::Config::default()
    })
}

/// Assemble the supervisor from CLI arguments layered over the config.
fn build_slideshow(args: EncodeArgs, cfg: &config::Config) -> engine::Slideshow {
    let extension = args
        .extension
        .unwrap_or_else(|| cfg.encoding.image_extension.clone());
    let images = engine::ImageSequence::new(args.prefix).with_extension(extension);

    let options = match args.raw {
        Some(raw) => engine::OptionSet::literal(raw),
        None => engine::OptionSet::from_pairs(args.options),
    };

    let mut request = engine::EncodeRequest::new(images, args.output, args.frames, options);
    if let Some(axis) = args.preserve {
        request = request.with_transcoder_options(engine::TranscoderOptions::preserving(axis));
    }

    let mut settings = cfg.encoder_settings();
    if let Some(secs) = args.timeout {
        settings.timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }

    engine::Slideshow::new(request, settings, Arc::new(cfg.probe()))
        .with_validation(cfg.validation_settings())
}

fn handle_encode(args: EncodeArgs) {
    let cfg = load_config();
    let mut slideshow = build_slideshow(args, &cfg);

    let result = slideshow.run(|progress| {
        let mut stderr = std::io::stderr();
        write!(stderr, "\rProgress: {:5.1}%", progress * 100.0)?;
        stderr.flush()?;
        Ok(())
    });
    eprintln!();

    match result {
        Ok(artifact) => {
            match artifact.duration() {
                Some(duration) => println!(
                    "Encoded: {} ({:.2} seconds)",
                    artifact.path().display(),
                    duration
                ),
                None => println!("Encoded: {}", artifact.path().display()),
            }
        }
        Err(e) => {
            eprintln!("Encoding failed: {}", e);
            if let Some(command) = e.command() {
                eprintln!("Command: {}", command);
            }
            process::exit(1);
        }
    }
}

fn handle_dry_run(args: EncodeArgs) {
    let cfg = load_config();
    let slideshow = build_slideshow(args, &cfg);

    if let Err(e) = slideshow.request().validate() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
    println!("{}", slideshow.command_line());
}

fn handle_probe(file: std::path::PathBuf) {
    use engine::MediaProbe;

    let cfg = load_config();
    let info = cfg.probe().probe(&file);

    match serde_json::to_string_pretty(&info) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
    if !info.exists {
        process::exit(1);
    }
}

fn handle_check_ffmpeg() {
    let cfg = load_config();

    match engine::ffmpeg_version(&cfg.binaries.ffmpeg) {
        Ok(version) => println!("ffmpeg found: {}", version),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
    match engine::ffprobe_version(&cfg.binaries.ffprobe) {
        Ok(version) => println!("ffprobe found: {}", version),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn handle_init_config() {
    let existed = config::Config::exists();
    if let Err(e) = config::Config::ensure_default() {
        eprintln!("Failed to save default config: {:#}", e);
        process::exit(1);
    }

    match config::Config::config_path() {
        Ok(path) if existed => println!("Config already exists at {}", path.display()),
        Ok(path) => println!("Default config saved to {}", path.display()),
        Err(e) => println!("Config ready, but config path unknown: {:#}", e),
    }

    match config::Config::load() {
        Ok(cfg) => println!("{:#?}", cfg),
        Err(e) => {
            eprintln!("Config invalid: {:#}", e);
            process::exit(1);
        }
    }
}
