// Command line front end for the ID card generator

use clap::{Parser, Subcommand};
use fayda_card::models::Fields;
use fayda_card::processing::{FieldExtractor, ImageRecovery, PhotoNormalizer};
use fayda_card::{CardConfig, CardError, CardGenerator, GenerationRequest};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "fayda-card", version, about = "Build a printable ID card from a national ID PDF")]
struct Cli {
    /// JSON configuration file; missing keys keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for recovered images and normalized photos
    #[arg(long, global = true)]
    image_dir: Option<PathBuf>,

    /// Directory for finished cards
    #[arg(long, global = true)]
    card_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the full pipeline and write a card
    Generate {
        #[arg(long)]
        pdf: PathBuf,
        #[arg(long)]
        photo: PathBuf,
        /// 12-digit FIN printed on the card
        #[arg(long)]
        fin: String,
        /// Seed for file names and the serial number
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the fields read from the first page
    Extract {
        #[arg(long)]
        pdf: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Write every embedded image to the image directory
    Images {
        #[arg(long)]
        pdf: PathBuf,
    },
    /// Strip the white background from a photo
    Normalize {
        #[arg(long)]
        photo: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<CardConfig, CardError> {
    let mut config = match &cli.config {
        Some(path) => CardConfig::from_json_file(path)?,
        None => CardConfig::default(),
    };
    if let Some(dir) = &cli.image_dir {
        config.image_dir = dir.clone();
    }
    if let Some(dir) = &cli.card_dir {
        config.card_dir = dir.clone();
    }
    config.ensure_directories()?;
    Ok(config)
}

fn print_fields(fields: &Fields) {
    println!("Full name:   {}", fields.fullname);
    println!("Birth date:  {}", fields.dob);
    println!("Sex:         {}", fields.sex);
    println!("Nationality: {}", fields.nationality);
    println!("Phone:       {}", fields.phone);
    println!("Region:      {}", fields.region);
    println!("Zone:        {}", fields.zone);
    println!("Woreda:      {}", fields.woreda);
    println!("FAN:         {}", fields.fan);
}

fn run(cli: Cli) -> Result<(), CardError> {
    let config = load_config(&cli)?;

    match cli.command {
        Command::Generate {
            pdf,
            photo,
            fin,
            seed,
        } => {
            let photo = fs::read(&photo)
                .map_err(|e| CardError::IoError(format!("Failed to read {:?}: {}", photo, e)))?;
            let request = GenerationRequest {
                pdf_path: Some(pdf),
                photo: Some(photo),
                fin,
            };
            let mut generator = match seed {
                Some(seed) => CardGenerator::with_seed(config, seed),
                None => CardGenerator::new(config),
            };
            let card = generator.generate(&request)?;
            println!("{}", serde_json::to_string_pretty(&card)?);
        }
        Command::Extract { pdf, json } => {
            let fields = FieldExtractor::new(&config).extract(&pdf);
            if json {
                println!("{}", serde_json::to_string_pretty(&fields)?);
            } else {
                print_fields(&fields);
            }
        }
        Command::Images { pdf } => {
            let mut rng = StdRng::from_entropy();
            let paths = ImageRecovery::new(&config).recover_images(&pdf, &mut rng);
            if paths.is_empty() {
                log::info!("No images recovered from {:?}", pdf);
            }
            for path in paths {
                println!("{}", path.display());
            }
        }
        Command::Normalize { photo } => {
            let bytes = fs::read(&photo)
                .map_err(|e| CardError::IoError(format!("Failed to read {:?}: {}", photo, e)))?;
            let mut rng = StdRng::from_entropy();
            match PhotoNormalizer::new(&config).normalize(Some(bytes.as_slice()), &mut rng) {
                Some(path) => println!("{}", path.display()),
                None => return Err(CardError::InvalidRequest("Error saving photo".to_string())),
            }
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Cli::parse()) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
