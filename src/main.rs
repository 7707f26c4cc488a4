use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use co2_explorer::app::explore;
use co2_explorer::data::{FuelCategory, VehicleInput};
use co2_explorer::training::train_models;
use co2_explorer::utils::{input, io, plot};
use co2_explorer::{AppConfig, AppContext, ExampleCar, ModelKind, Result, ValidationMode};

#[derive(Parser)]
#[command(name = "co2-explorer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Explore vehicle CO2 emissions and compare regression models", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dataset CSV (overrides the configuration)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Fail on the first malformed row or indicator instead of skipping it
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarise the dataset
    Explore,

    /// Fit the three models and save their artifacts
    Train {
        /// Directory for training-curve plots
        #[arg(long)]
        plot_dir: Option<PathBuf>,
    },

    /// Score a model on the held-out rows
    Evaluate {
        #[arg(short, long, value_enum, default_value = "segmented")]
        model: ModelKind,

        /// Write a predictions-vs-actual scatter to this PNG
        #[arg(long)]
        plot: Option<PathBuf>,
    },

    /// Predict CO2 for a vehicle configuration; missing values are prompted for
    Predict {
        #[arg(short, long, value_enum, default_value = "segmented")]
        model: ModelKind,

        /// Combined consumption (l/100km)
        #[arg(long)]
        consumption: Option<f64>,

        /// Fuel type (essence, gnv, gpl, gazole, e85)
        #[arg(long)]
        fuel: Option<FuelCategory>,

        /// Administrative power rating
        #[arg(long)]
        power: Option<f64>,

        /// Minimum unladen mass (kg)
        #[arg(long)]
        mass: Option<f64>,
    },

    /// Predict CO2 for a well-known car
    Example {
        #[arg(short, long, value_enum)]
        car: ExampleCar,
    },
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    if let Some(data) = &cli.data {
        config.dataset.path = data.clone();
    }
    if cli.strict {
        config.validation = ValidationMode::Strict;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Explore => {
            println!("{}", explore(&config)?);
        }

        Commands::Train { plot_dir } => {
            let context = AppContext::prepare(&config)?;
            let trained = train_models(context.encodings(), context.split(), &config.training)?;
            io::save_models(&config.artifacts, &trained.models)?;

            if let Some(dir) = plot_dir {
                std::fs::create_dir_all(&dir)?;
                plot::training_curve(&trained.network_history, "Neural network training", &dir.join("network_training.png"))?;
                plot::training_curve(&trained.segmented_history, "Segmented regression training", &dir.join("segmented_training.png"))?;
            }

            let context = context.with_models(trained.models);
            for kind in ModelKind::ALL {
                let evaluation = context.evaluate(kind)?;
                println!("== {} ==\n{}\n", kind, evaluation.metrics);
            }
        }

        Commands::Evaluate { model, plot: plot_path } => {
            let context = AppContext::load(&config)?;
            let evaluation = context.evaluate(model)?;
            println!("Selected model: {}\n", model);
            println!("{}", evaluation.metrics);
            if let Some(path) = plot_path {
                plot::prediction_scatter(
                    &evaluation.predicted.view(),
                    &evaluation.actual.view(),
                    &format!("{}: predictions vs actual", model),
                    &path,
                )?;
            }
        }

        Commands::Predict { model, consumption, fuel, power, mass } => {
            let context = AppContext::load(&config)?;
            let bounds = *context.bounds();
            let vehicle = VehicleInput {
                consumption: match consumption {
                    Some(v) => v,
                    None => input::prompt_bounded("Consommation mixte (l/100km)", &bounds.consumption)?,
                },
                fuel: match fuel {
                    Some(f) => f,
                    None => input::prompt_fuel()?,
                },
                power: match power {
                    Some(v) => v,
                    None => input::prompt_bounded("Puissance administrative", &bounds.power)?,
                },
                mass: match mass {
                    Some(v) => v,
                    None => input::prompt_bounded("masse vide euro min (kg)", &bounds.mass)?,
                },
            };
            let co2 = context.predict_vehicle(model, &vehicle)?;
            println!("Predicted CO2 emissions ({}): {:.2} g/km", model, co2);
        }

        Commands::Example { car } => {
            let context = AppContext::load(&config)?;
            let co2 = context.predict_example(car)?;
            println!("Predicted CO2 emissions for {}: {:.2} g/km", car, co2);
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}
