use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;

use aquawatch_service::alert::evaluate;
use aquawatch_service::analysis::overview::{dashboard_overview, water_body_detail};
use aquawatch_service::config::{AppConfig, DEFAULT_CONFIG_PATH};
use aquawatch_service::db;
use aquawatch_service::dev_mode::seed_sample_data;
use aquawatch_service::export::export_measurements;
use aquawatch_service::ingest::workbook;
use aquawatch_service::logging::{self, Component};
use aquawatch_service::model::{NewMeasurement, WaterQualityReadings};
use aquawatch_service::store::{MeasurementFilter, MemoryStore, PostgresStore, WaterQualityStore};
use aquawatch_service::submission::submit_measurement;

#[derive(Parser, Debug)]
#[command(name = "aquawatch")]
#[command(about = "Water quality tracking and EPA compliance reporting", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// The seven parameters of a field sample
#[derive(clap::Args, Debug)]
struct ReadingArgs {
    #[arg(long)]
    ph: f64,
    /// mg/L
    #[arg(long)]
    dissolved_oxygen: f64,
    /// °C
    #[arg(long, allow_negative_numbers = true)]
    temperature: f64,
    /// NTU
    #[arg(long)]
    turbidity: f64,
    /// mg/L
    #[arg(long)]
    nitrates: f64,
    /// mg/L
    #[arg(long)]
    phosphates: f64,
    /// CFU/100mL
    #[arg(long)]
    ecoli: i32,
}

impl ReadingArgs {
    fn readings(&self) -> WaterQualityReadings {
        WaterQualityReadings {
            ph: self.ph,
            dissolved_oxygen: self.dissolved_oxygen,
            temperature: self.temperature,
            turbidity: self.turbidity,
            nitrates: self.nitrates,
            phosphates: self.phosphates,
            ecoli_count: self.ecoli,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the configured standards
    Standards,

    /// Check readings against the standards without storing them
    Evaluate {
        #[command(flatten)]
        readings: ReadingArgs,
    },

    /// Record a field measurement
    Submit {
        /// Water body name
        #[arg(long)]
        water_body: String,
        #[command(flatten)]
        readings: ReadingArgs,
        /// Field researcher
        #[arg(long)]
        measured_by: String,
        /// When the sample was taken (YYYY-MM-DD or RFC 3339); defaults to now
        #[arg(long)]
        measured_at: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        latitude: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        longitude: Option<f64>,
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Export measurements to a compliance spreadsheet
    Export {
        /// Only this water body
        #[arg(long)]
        water_body: Option<String>,
        /// First day to include (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        start: Option<String>,
        /// Last day to include (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        end: Option<String>,
        /// Directory the file is written to
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Load water bodies and measurements from a workbook
    Import {
        path: PathBuf,
        /// Parse and validate only; nothing is written to the database
        #[arg(long)]
        dry_run: bool,
    },

    /// Dashboard summary as JSON
    Overview,

    /// Statistics and recent measurements for one water body, as JSON
    WaterBody { name: String },

    /// Stop listing a water body as actively monitored
    Deactivate { name: String },

    /// Load sample water bodies and a month of random measurements
    Seed {
        /// RNG seed, for a reproducible data set
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        logging::error(Component::System, None, &format!("{:#}", e));
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    logging::init_logger(
        config.logging.level,
        config.logging.file.as_deref(),
        config.logging.timestamps,
    )
    .context("opening log file")?;
    logging::debug(
        Component::Config,
        Some(&cli.config.display().to_string()),
        &format!("standards: {:?}", config.standards),
    );
    let standards = &config.standards;

    match cli.command {
        Command::Standards => {
            for entry in standards.entries() {
                println!("{:<28} {:>8} {}", entry.label, entry.value, entry.unit);
            }
        }

        Command::Evaluate { readings } => {
            let readings = readings.readings();
            readings.validate()?;
            let evaluation = evaluate(&readings, standards);
            println!("{}", serde_json::to_string_pretty(&evaluation)?);
        }

        Command::Submit {
            water_body,
            readings,
            measured_by,
            measured_at,
            latitude,
            longitude,
            notes,
        } => {
            let mut store = open_store(&config)?;
            let wb = store
                .find_water_body(&water_body)?
                .with_context(|| format!("water body not found: {}", water_body))?;
            let measured_at = match measured_at {
                Some(text) => parse_bound(&text, NaiveTime::MIN)?,
                None => Utc::now(),
            };
            let submission = submit_measurement(
                &mut store,
                NewMeasurement {
                    water_body_id: wb.id,
                    measured_at,
                    readings: readings.readings(),
                    sample_latitude: latitude,
                    sample_longitude: longitude,
                    measured_by,
                    notes,
                },
                standards,
            )?;
            println!("Measurement submitted successfully! ({})", submission.measurement.label(&wb));
            for warning in submission.warnings() {
                println!("  ⚠ {}", warning);
            }
        }

        Command::Export {
            water_body,
            start,
            end,
            out,
        } => {
            let mut store = open_store(&config)?;
            let water_body_id = match water_body {
                Some(name) => Some(
                    store
                        .find_water_body(&name)?
                        .with_context(|| format!("water body not found: {}", name))?
                        .id,
                ),
                None => None,
            };
            let filter = MeasurementFilter {
                water_body_id,
                start: start.as_deref().map(|s| parse_bound(s, NaiveTime::MIN)).transpose()?,
                end: end.as_deref().map(|s| parse_bound(s, end_of_day())).transpose()?,
                limit: None,
            };
            let file = export_measurements(&mut store, &filter, standards, Utc::now())?;
            let path = file.write_to_dir(&out)?;
            println!("✓ Wrote {}", path.display());
        }

        Command::Import { path, dry_run } => {
            let summary = if dry_run {
                workbook::import_path(&path, &mut MemoryStore::new(), standards)?
            } else {
                workbook::import_path(&path, &mut open_store(&config)?, standards)?
            };
            println!(
                "✓ Loaded {} measurements for {} water bodies ({} new)",
                summary.measurements_created,
                summary.water_bodies_created + summary.water_bodies_existing,
                summary.water_bodies_created
            );
            println!("✓ Measurements with EPA alerts: {}", summary.measurements_with_alerts);
            for skipped in &summary.skipped {
                println!("  ⚠ {} row {}: {}", skipped.sheet, skipped.row, skipped.reason);
            }
        }

        Command::Overview => {
            let mut store = open_store(&config)?;
            let overview = dashboard_overview(&mut store, standards, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&overview)?);
        }

        Command::WaterBody { name } => {
            let mut store = open_store(&config)?;
            let wb = store
                .find_water_body(&name)?
                .with_context(|| format!("water body not found: {}", name))?;
            let detail = water_body_detail(&mut store, wb.id, standards)?
                .with_context(|| format!("water body not found: {}", name))?;
            println!("{}", serde_json::to_string_pretty(&detail)?);
        }

        Command::Deactivate { name } => {
            let mut store = open_store(&config)?;
            let wb = store
                .find_water_body(&name)?
                .with_context(|| format!("water body not found: {}", name))?;
            let wb = store.set_water_body_active(wb.id, false)?;
            println!("✓ {} is no longer active", wb);
        }

        Command::Seed { seed } => {
            let mut store = open_store(&config)?;
            let mut rng = match seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            let summary = seed_sample_data(&mut store, standards, &mut rng, Utc::now())?;
            println!(
                "✓ Created {} measurements for {} water bodies ({} new)",
                summary.measurements_created,
                summary.water_bodies_created + summary.water_bodies_existing,
                summary.water_bodies_created
            );
            println!("✓ Measurements with EPA alerts: {}", summary.measurements_with_alerts);
        }
    }
    Ok(())
}

fn open_store(config: &AppConfig) -> Result<PostgresStore> {
    let url = config.database_url()?;
    let client = db::connect_and_verify(&url)?;
    logging::debug(Component::Store, None, "connected to database");
    Ok(PostgresStore::new(client))
}

/// Last representable instant of a day, so `--end <date>` covers samples
/// stored with sub-second precision.
fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN)
}

/// RFC 3339 timestamps are used as given; a bare date gets `time_of_day`.
fn parse_bound(text: &str, time_of_day: NaiveTime) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        Ok(date) => Ok(date.and_time(time_of_day).and_utc()),
        Err(_) => bail!("expected YYYY-MM-DD or an RFC 3339 timestamp, got '{}'", text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquawatch_service::model::Measurement;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_bare_end_date_covers_the_last_second() {
        let end = parse_bound("2024-06-30", end_of_day()).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap() + Duration::milliseconds(400);
        let next_day = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        assert!(late <= end);
        assert!(next_day > end);

        let m = Measurement {
            id: 1,
            water_body_id: 1,
            measured_at: late,
            readings: WaterQualityReadings {
                ph: 7.5,
                dissolved_oxygen: 8.0,
                temperature: 20.0,
                turbidity: 3.0,
                nitrates: 5.0,
                phosphates: 0.05,
                ecoli_count: 50,
            },
            sample_location: None,
            measured_by: "Field Team".to_string(),
            notes: String::new(),
            created_at: late,
        };
        let filter = MeasurementFilter {
            end: Some(end),
            ..Default::default()
        };
        assert!(filter.matches(&m));
    }

    #[test]
    fn test_bare_start_date_is_midnight() {
        let start = parse_bound("2024-06-01", NaiveTime::MIN).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_rfc3339_bound_is_used_as_given() {
        let bound = parse_bound("2024-06-01T12:00:00+02:00", end_of_day()).unwrap();
        assert_eq!(bound, Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap());
        assert!(parse_bound("June 1st", NaiveTime::MIN).is_err());
    }
}
