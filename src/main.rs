//! partscan - recognise electronic components from photos and keep an inventory
//!
//! Photos go through the colour, text and vision paths of the recognition
//! orchestrator; accepted results can be stored in a local SQLite inventory.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use partscan::classifier;
use partscan::config::{self, AppConfig};
use partscan::recognition::extractor::extract_specs;
use partscan::recognition::{Evidence, Orchestrator, RecognitionError, RecognitionResult};
use partscan::resistor;
use partscan::storage::{self, Component, Database, NewComponent};
use partscan::vision::Photo;

#[derive(Parser, Debug)]
#[command(name = "partscan", version)]
#[command(about = "Recognise electronic components from photos and track them in an inventory")]
struct Args {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Inventory database file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recognise the component in a photo
    Recognize {
        image: PathBuf,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
        /// Store an accepted result in the inventory
        #[arg(long)]
        save: bool,
        #[arg(long, default_value_t = 1, requires = "save")]
        quantity: u32,
        #[arg(long, requires = "save")]
        minimum: Option<u32>,
        /// Container name, created if it does not exist
        #[arg(long, requires = "save")]
        container: Option<String>,
    },
    /// Decode resistor colour bands, e.g. `decode brown black red gold`
    Decode {
        #[arg(required = true)]
        colors: Vec<String>,
    },
    /// Add a component by hand
    Add {
        name: String,
        /// Component type; guessed from the name and description when omitted
        #[arg(long = "type")]
        component_type: Option<String>,
        #[arg(long)]
        part_number: Option<String>,
        #[arg(long)]
        manufacturer: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Specification as key=value, repeatable; overrides --specs-text
        #[arg(long = "spec", value_parser = parse_spec)]
        specs: Vec<(String, String)>,
        /// Free-text specifications, e.g. "10kΩ ±5% 0.25W"
        #[arg(long)]
        specs_text: Option<String>,
        #[arg(long, default_value_t = 0)]
        quantity: u32,
        #[arg(long)]
        minimum: Option<u32>,
        #[arg(long)]
        container: Option<String>,
    },
    /// Search components by name, part number, type or description
    Search { query: String },
    /// Show one component with its stock history
    Show { id: String },
    /// Change the quantity of a component, e.g. `stock <id> -5`
    Stock {
        id: String,
        #[arg(allow_hyphen_values = true)]
        delta: i64,
        #[arg(long)]
        reason: Option<String>,
    },
    /// List components at or below their minimum quantity
    LowStock,
    /// Inventory totals per component type
    Status,
    /// List containers
    Containers,
    /// Add a container
    ContainerAdd {
        name: String,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Show the specification fields expected for a component type
    Template { component_type: String },
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_spec(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => storage::default_config_path()?,
    };

    if let Command::InitConfig { force } = args.command {
        return init_config(&config_path, force);
    }

    let config = load_or_default_config(&config_path)?;

    match args.command {
        Command::Recognize {
            image,
            json,
            save,
            quantity,
            minimum,
            container,
        } => {
            let options = SaveOptions {
                quantity,
                minimum,
                container,
            };
            recognize(&config, args.database.as_deref(), &image, json, save.then_some(options)).await
        }
        Command::Decode { colors } => decode(&colors),
        Command::Add {
            name,
            component_type,
            part_number,
            manufacturer,
            description,
            specs,
            specs_text,
            quantity,
            minimum,
            container,
        } => {
            let mut db = open_database(&config, args.database.as_deref())?;
            let component_type = component_type
                .map(|t| classifier::normalize_type(&t))
                .unwrap_or_else(|| guess_type(&name, description.as_deref()));

            let mut record = NewComponent::new(component_type, name);
            record.part_number = part_number;
            record.manufacturer = manufacturer;
            record.description = description;
            record.specifications =
                collect_specs(&record.component_type, specs_text.as_deref(), specs);
            record.tags = vec![record.component_type.clone()];
            record.quantity = quantity;
            record.minimum_quantity = minimum.unwrap_or(config.inventory.default_minimum_quantity);
            record.container_id = resolve_container(&db, container.as_deref())?;

            let stored = db.insert_component(&record)?;
            println!("Added {} ({})", stored.name, stored.id);
            print_storage_hint(&stored.component_type, stored.container.as_deref());
            Ok(())
        }
        Command::Search { query } => {
            let db = open_database(&config, args.database.as_deref())?;
            let found = db.search_components(&query)?;
            if found.is_empty() {
                println!("No components match '{}'", query);
            }
            for component in &found {
                print_component_line(component);
            }
            Ok(())
        }
        Command::Show { id } => {
            let db = open_database(&config, args.database.as_deref())?;
            let Some(component) = db.get_component(&id)? else {
                bail!("No component with id {}", id);
            };
            print_component(&component);
            let history = db.stock_history(&id)?;
            if !history.is_empty() {
                println!("History:");
                for movement in history {
                    println!(
                        "  {} {:+} {}",
                        movement.created_at,
                        movement.delta,
                        movement.reason.unwrap_or_default()
                    );
                }
            }
            Ok(())
        }
        Command::Stock { id, delta, reason } => {
            let mut db = open_database(&config, args.database.as_deref())?;
            let quantity = db.adjust_stock(&id, delta, reason.as_deref())?;
            println!("{} now has {} in stock", id, quantity);
            Ok(())
        }
        Command::LowStock => {
            let db = open_database(&config, args.database.as_deref())?;
            let low = db.low_stock()?;
            if low.is_empty() {
                println!("All components are above their minimum quantity");
            }
            for component in &low {
                println!(
                    "{}  {}  {}/{}",
                    component.id, component.name, component.quantity, component.minimum_quantity
                );
            }
            Ok(())
        }
        Command::Status => {
            let db = open_database(&config, args.database.as_deref())?;
            let summary = db.summary_by_type()?;
            let low = db.low_stock()?;
            let unique: u32 = summary.iter().map(|s| s.unique_components).sum();
            let total: u64 = summary.iter().map(|s| s.total_quantity).sum();

            println!("Unique components: {}", unique);
            println!("Total items:       {}", total);
            println!("Low stock:         {}", low.len());
            for line in &summary {
                println!(
                    "  {:<16} {:>4} types {:>7} items",
                    line.component_type, line.unique_components, line.total_quantity
                );
            }
            Ok(())
        }
        Command::Containers => {
            let db = open_database(&config, args.database.as_deref())?;
            for container in db.list_containers()? {
                println!(
                    "{:<20} {}",
                    container.name,
                    container.location.unwrap_or_default()
                );
            }
            Ok(())
        }
        Command::ContainerAdd {
            name,
            location,
            description,
        } => {
            let db = open_database(&config, args.database.as_deref())?;
            let container = db.add_container(&name, location.as_deref(), description.as_deref())?;
            println!("Added container {}", container.name);
            Ok(())
        }
        Command::Template { component_type } => {
            let kind = classifier::normalize_type(&component_type);
            println!("{}", kind);
            if let Some(category) = classifier::category(&kind) {
                println!("  {}", category.description);
            }
            for (field, example) in classifier::spec_template(&kind) {
                println!("  {:<14} e.g. {}", field, example);
            }
            println!("Suggested storage: {}", classifier::storage_location(&kind));
            Ok(())
        }
        Command::InitConfig { .. } => Ok(()),
    }
}

struct SaveOptions {
    quantity: u32,
    minimum: Option<u32>,
    container: Option<String>,
}

async fn recognize(
    config: &AppConfig,
    database: Option<&Path>,
    image: &Path,
    json: bool,
    save: Option<SaveOptions>,
) -> Result<()> {
    let photo = Photo::open(image).await?;
    let orchestrator = Orchestrator::from_config(config);

    let result = match orchestrator.recognize(&photo).await {
        Ok(result) => result,
        Err(RecognitionError::CollaboratorUnavailable { source, evidence }) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&evidence)?);
            } else {
                print_evidence(&evidence);
            }
            return Err(source).context("Recognition incomplete, try again later");
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    let Some(options) = save else {
        return Ok(());
    };
    let RecognitionResult::Accepted { candidate, evidence } = &result else {
        bail!("Nothing was recognised, not saving");
    };

    let mut db = open_database(config, database)?;
    let mut record = NewComponent::from_recognition(candidate, evidence);
    record.quantity = options.quantity;
    record.minimum_quantity = options
        .minimum
        .unwrap_or(config.inventory.default_minimum_quantity);
    record.image_sha256 = Some(photo.fingerprint());
    record.container_id = resolve_container(&db, options.container.as_deref())?;

    let stored = db.insert_component(&record)?;
    if !json {
        println!("Saved as {}", stored.id);
        print_storage_hint(&stored.component_type, stored.container.as_deref());
    }
    Ok(())
}

fn decode(colors: &[String]) -> Result<()> {
    let value = resistor::decode_names(colors)?;
    println!("{}", value);
    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{:?} already exists, use --force to overwrite", path);
    }
    config::save_config(&AppConfig::default(), path)?;
    println!("Wrote default configuration to {:?}", path);
    Ok(())
}

fn load_or_default_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

fn open_database(config: &AppConfig, explicit: Option<&Path>) -> Result<Database> {
    let path = match explicit.or(config.inventory.database_path.as_deref()) {
        Some(path) => path.to_path_buf(),
        None => storage::default_database_path()?,
    };
    Database::open(&path)
}

/// Look up a container by name, creating it on first use
fn resolve_container(db: &Database, name: Option<&str>) -> Result<Option<i64>> {
    let Some(name) = name else {
        return Ok(None);
    };
    if let Some(container) = db.find_container(name)? {
        return Ok(Some(container.id));
    }
    warn!("Container '{}' did not exist, creating it", name);
    Ok(Some(db.add_container(name, None, None)?.id))
}

/// Specs parsed from free text, then explicit key=value pairs on top
fn collect_specs(
    component_type: &str,
    text: Option<&str>,
    pairs: Vec<(String, String)>,
) -> BTreeMap<String, String> {
    let mut specs = text
        .map(|text| extract_specs(text, component_type))
        .unwrap_or_default();
    specs.extend(pairs);
    specs
}

fn guess_type(name: &str, description: Option<&str>) -> String {
    let text = format!("{} {}", name, description.unwrap_or_default());
    classifier::classify(&text)
        .first()
        .map(|kind| kind.to_string())
        .unwrap_or_else(|| classifier::UNKNOWN_TYPE.to_string())
}

fn print_result(result: &RecognitionResult) {
    match result {
        RecognitionResult::Accepted { candidate, .. } => {
            println!("{}", candidate.display_name);
            println!("  type:        {}", candidate.component_type);
            println!(
                "  confidence:  {}% ({} path)",
                candidate.confidence, candidate.source
            );
            if let Some(part_number) = &candidate.part_number {
                println!("  part number: {}", part_number);
            }
            if let Some(manufacturer) = &candidate.manufacturer {
                println!("  maker:       {}", manufacturer);
            }
            for (key, value) in &candidate.specifications {
                println!("  {:<12} {}", format!("{}:", key), value);
            }
            if let Some(description) = &candidate.description {
                println!("  {}", description);
            }
        }
        RecognitionResult::Rejected { .. } => println!("Could not recognise the component"),
    }
    print_evidence(result.evidence());
}

fn print_evidence(evidence: &Evidence) {
    if !evidence.bands.is_empty() {
        let bands: Vec<_> = evidence.bands.iter().map(|c| c.name()).collect();
        println!("  bands:       {}", bands.join(" "));
    }
    let text = evidence.ocr_text.trim();
    if !text.is_empty() {
        println!("  ocr text:    {}", text.replace('\n', " / "));
    }
    if evidence.candidates.len() > 1 {
        println!("  considered:");
        for candidate in &evidence.candidates {
            println!(
                "    {} ({}%, {})",
                candidate.display_name, candidate.confidence, candidate.source
            );
        }
    }
}

fn print_component_line(component: &Component) {
    println!(
        "{}  {:<28} {:<12} qty {}{}",
        component.id,
        component.name,
        component.component_type,
        component.quantity,
        if component.is_low_stock() { " (low)" } else { "" }
    );
}

fn print_component(component: &Component) {
    println!("{}", component.name);
    println!("  id:          {}", component.id);
    println!("  type:        {}", component.component_type);
    if let Some(part_number) = &component.part_number {
        println!("  part number: {}", part_number);
    }
    if let Some(manufacturer) = &component.manufacturer {
        println!("  maker:       {}", manufacturer);
    }
    println!(
        "  quantity:    {} (minimum {})",
        component.quantity, component.minimum_quantity
    );
    if let Some(container) = &component.container {
        println!("  container:   {}", container);
    }
    for (key, value) in &component.specifications {
        println!("  {:<12} {}", format!("{}:", key), value);
    }
    if let Some(description) = &component.description {
        println!("  {}", description);
    }
    if let (Some(confidence), Some(source)) = (component.confidence, component.source) {
        println!("  recognised:  {}% via {}", confidence, source);
    }
}

fn print_storage_hint(component_type: &str, container: Option<&str>) {
    if container.is_none() {
        println!(
            "Suggested storage: {}",
            classifier::storage_location(component_type)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spec() {
        assert_eq!(
            parse_spec(" voltage = 5V "),
            Ok(("voltage".to_string(), "5V".to_string()))
        );
        assert!(parse_spec("no-separator").is_err());
        assert!(parse_spec("=5V").is_err());
    }

    #[test]
    fn test_collect_specs_merges_free_text_and_pairs() {
        let specs = collect_specs(
            "resistor",
            Some("4.7kΩ ±1% 0.25W"),
            vec![("tolerance".to_string(), "±5%".to_string())],
        );
        assert_eq!(specs["resistance"], "4.7kΩ");
        assert_eq!(specs["power_rating"], "0.25W");
        assert_eq!(specs["tolerance"], "±5%");

        assert!(collect_specs("resistor", None, Vec::new()).is_empty());
    }

    #[test]
    fn test_guess_type() {
        assert_eq!(guess_type("Red LED", Some("5mm diffused")), "led");
        assert_eq!(guess_type("zzqx", None), classifier::UNKNOWN_TYPE);
    }
}
