//! SQLite inventory: components, containers and stock movements

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::recognition::candidate::{Evidence, RecognitionCandidate, SourcePath};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS containers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        location TEXT,
        description TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE TABLE IF NOT EXISTS components (
        id TEXT PRIMARY KEY,
        component_type TEXT NOT NULL,
        name TEXT NOT NULL,
        part_number TEXT,
        manufacturer TEXT,
        specifications TEXT NOT NULL DEFAULT '{}',
        description TEXT,
        tags TEXT NOT NULL DEFAULT '[]',
        quantity INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
        minimum_quantity INTEGER NOT NULL DEFAULT 0,
        container_id INTEGER REFERENCES containers(id) ON DELETE SET NULL,
        confidence INTEGER,
        source TEXT,
        ocr_text TEXT,
        image_sha256 TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_components_type ON components(component_type);
    CREATE INDEX IF NOT EXISTS idx_components_part_number ON components(part_number);
    CREATE TABLE IF NOT EXISTS stock_movements (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        component_id TEXT NOT NULL REFERENCES components(id) ON DELETE CASCADE,
        delta INTEGER NOT NULL,
        reason TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_movements_component ON stock_movements(component_id);
";

const COMPONENT_COLUMNS: &str = "c.id, c.component_type, c.name, c.part_number, c.manufacturer,
    c.specifications, c.description, c.tags, c.quantity, c.minimum_quantity,
    k.name, c.confidence, c.source, c.ocr_text, c.image_sha256, c.created_at, c.updated_at";

/// Physical storage place (drawer, box, bin)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Container {
    pub id: i64,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// A component about to be stored
#[derive(Debug, Clone, Default)]
pub struct NewComponent {
    pub component_type: String,
    pub name: String,
    pub part_number: Option<String>,
    pub manufacturer: Option<String>,
    pub specifications: BTreeMap<String, String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub quantity: u32,
    pub minimum_quantity: u32,
    pub container_id: Option<i64>,
    pub confidence: Option<u8>,
    pub source: Option<SourcePath>,
    pub ocr_text: Option<String>,
    pub image_sha256: Option<String>,
}

impl NewComponent {
    pub fn new(component_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Record for an accepted recognition, keeping its provenance
    pub fn from_recognition(candidate: &RecognitionCandidate, evidence: &Evidence) -> Self {
        let ocr_text = evidence.ocr_text.trim();
        Self {
            component_type: candidate.component_type.clone(),
            name: candidate.display_name.clone(),
            part_number: candidate.part_number.clone(),
            manufacturer: candidate.manufacturer.clone(),
            specifications: candidate.specifications.clone(),
            description: candidate.description.clone(),
            tags: candidate.tags.clone(),
            confidence: Some(candidate.confidence),
            source: Some(candidate.source),
            ocr_text: (!ocr_text.is_empty()).then(|| ocr_text.to_string()),
            ..Self::default()
        }
    }
}

/// A stored component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    pub id: String,
    pub component_type: String,
    pub name: String,
    pub part_number: Option<String>,
    pub manufacturer: Option<String>,
    pub specifications: BTreeMap<String, String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub quantity: u32,
    pub minimum_quantity: u32,
    /// Container name
    pub container: Option<String>,
    pub confidence: Option<u8>,
    pub source: Option<SourcePath>,
    pub ocr_text: Option<String>,
    pub image_sha256: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Component {
    /// At or below a non-zero minimum
    pub fn is_low_stock(&self) -> bool {
        self.minimum_quantity > 0 && self.quantity <= self.minimum_quantity
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let specifications: String = row.get(5)?;
        let tags: String = row.get(7)?;
        let source: Option<String> = row.get(12)?;
        Ok(Self {
            id: row.get(0)?,
            component_type: row.get(1)?,
            name: row.get(2)?,
            part_number: row.get(3)?,
            manufacturer: row.get(4)?,
            specifications: serde_json::from_str(&specifications).unwrap_or_default(),
            description: row.get(6)?,
            tags: serde_json::from_str(&tags).unwrap_or_default(),
            quantity: row.get(8)?,
            minimum_quantity: row.get(9)?,
            container: row.get(10)?,
            confidence: row.get(11)?,
            source: source.and_then(|s| s.parse().ok()),
            ocr_text: row.get(13)?,
            image_sha256: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }
}

/// One quantity change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockMovement {
    pub component_id: String,
    pub delta: i64,
    pub reason: Option<String>,
    pub created_at: String,
}

/// Per-type inventory totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeSummary {
    pub component_type: String,
    pub unique_components: u32,
    pub total_quantity: u64,
}

/// Database connection wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create the inventory at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open inventory database {:?}", path))?;
        let db = Self { conn };
        db.init_schema()?;
        info!("Inventory opened at {:?}", path);
        Ok(db)
    }

    /// Create an in-memory inventory (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.conn
            .execute_batch(SCHEMA)
            .context("Failed to create inventory schema")?;
        Ok(())
    }

    pub fn add_container(
        &self,
        name: &str,
        location: Option<&str>,
        description: Option<&str>,
    ) -> Result<Container> {
        let name = name.trim();
        if name.is_empty() {
            bail!("Container name cannot be empty");
        }
        self.conn
            .execute(
                "INSERT INTO containers (name, location, description) VALUES (?1, ?2, ?3)",
                params![name, location, description],
            )
            .with_context(|| format!("Failed to add container '{}'", name))?;

        info!("Added container '{}'", name);
        Ok(Container {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            location: location.map(str::to_string),
            description: description.map(str::to_string),
        })
    }

    /// Case-insensitive lookup by name
    pub fn find_container(&self, name: &str) -> Result<Option<Container>> {
        self.conn
            .query_row(
                "SELECT id, name, location, description FROM containers
                 WHERE name = ?1 COLLATE NOCASE",
                params![name.trim()],
                |row| {
                    Ok(Container {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        location: row.get(2)?,
                        description: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("Failed to look up container")
    }

    pub fn list_containers(&self) -> Result<Vec<Container>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, location, description FROM containers ORDER BY name")?;
        let containers = stmt
            .query_map([], |row| {
                Ok(Container {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    location: row.get(2)?,
                    description: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(containers)
    }

    /// Store a component; an initial quantity is recorded as a movement
    pub fn insert_component(&mut self, component: &NewComponent) -> Result<Component> {
        let id = uuid::Uuid::new_v4().to_string();
        let specifications = serde_json::to_string(&component.specifications)?;
        let tags = serde_json::to_string(&component.tags)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO components (id, component_type, name, part_number, manufacturer,
                specifications, description, tags, quantity, minimum_quantity, container_id,
                confidence, source, ocr_text, image_sha256)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                id,
                component.component_type,
                component.name,
                component.part_number,
                component.manufacturer,
                specifications,
                component.description,
                tags,
                component.quantity,
                component.minimum_quantity,
                component.container_id,
                component.confidence,
                component.source.map(|s| s.name()),
                component.ocr_text,
                component.image_sha256,
            ],
        )
        .with_context(|| format!("Failed to insert component '{}'", component.name))?;

        if component.quantity > 0 {
            tx.execute(
                "INSERT INTO stock_movements (component_id, delta, reason) VALUES (?1, ?2, 'initial stock')",
                params![id, component.quantity],
            )?;
        }
        tx.commit()?;

        info!(
            "Stored {} '{}' x{} as {}",
            component.component_type, component.name, component.quantity, id
        );
        self.get_component(&id)?
            .ok_or_else(|| anyhow::anyhow!("Component {} vanished after insert", id))
    }

    pub fn get_component(&self, id: &str) -> Result<Option<Component>> {
        let sql = format!(
            "SELECT {} FROM components c LEFT JOIN containers k ON k.id = c.container_id
             WHERE c.id = ?1",
            COMPONENT_COLUMNS
        );
        self.conn
            .query_row(&sql, params![id], Component::from_row)
            .optional()
            .context("Failed to load component")
    }

    /// Case-insensitive substring match on name, part number, type and description
    pub fn search_components(&self, query: &str) -> Result<Vec<Component>> {
        let pattern = format!("%{}%", query.trim());
        let sql = format!(
            "SELECT {} FROM components c LEFT JOIN containers k ON k.id = c.container_id
             WHERE c.name LIKE ?1 OR c.part_number LIKE ?1
                OR c.component_type LIKE ?1 OR c.description LIKE ?1
             ORDER BY c.name",
            COMPONENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let components = stmt
            .query_map(params![pattern], Component::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!("Search '{}' matched {} components", query, components.len());
        Ok(components)
    }

    /// Apply a quantity change and log it; returns the new quantity
    pub fn adjust_stock(&mut self, id: &str, delta: i64, reason: Option<&str>) -> Result<u32> {
        let tx = self.conn.transaction()?;
        let current: Option<i64> = tx
            .query_row(
                "SELECT quantity FROM components WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(current) = current else {
            bail!("No component with id {}", id);
        };

        let updated = current + delta;
        if updated < 0 {
            bail!(
                "Cannot remove {} from component {}: only {} in stock",
                -delta,
                id,
                current
            );
        }
        let updated = u32::try_from(updated).context("Quantity out of range")?;

        tx.execute(
            "UPDATE components SET quantity = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![updated, id],
        )?;
        tx.execute(
            "INSERT INTO stock_movements (component_id, delta, reason) VALUES (?1, ?2, ?3)",
            params![id, delta, reason],
        )?;
        tx.commit()?;

        info!("Stock of {} changed by {} to {}", id, delta, updated);
        Ok(updated)
    }

    /// Movements for one component, oldest first
    pub fn stock_history(&self, id: &str) -> Result<Vec<StockMovement>> {
        let mut stmt = self.conn.prepare(
            "SELECT component_id, delta, reason, created_at FROM stock_movements
             WHERE component_id = ?1 ORDER BY id ASC",
        )?;
        let movements = stmt
            .query_map(params![id], |row| {
                Ok(StockMovement {
                    component_id: row.get(0)?,
                    delta: row.get(1)?,
                    reason: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(movements)
    }

    /// Components at or below their non-zero minimum, emptiest first
    pub fn low_stock(&self) -> Result<Vec<Component>> {
        let sql = format!(
            "SELECT {} FROM components c LEFT JOIN containers k ON k.id = c.container_id
             WHERE c.minimum_quantity > 0 AND c.quantity <= c.minimum_quantity
             ORDER BY CAST(c.quantity AS REAL) / c.minimum_quantity, c.name",
            COMPONENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let components = stmt
            .query_map([], Component::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(components)
    }

    pub fn summary_by_type(&self) -> Result<Vec<TypeSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT component_type, COUNT(*), COALESCE(SUM(quantity), 0) FROM components
             GROUP BY component_type ORDER BY component_type",
        )?;
        let summary = stmt
            .query_map([], |row| {
                Ok(TypeSummary {
                    component_type: row.get(0)?,
                    unique_components: row.get(1)?,
                    total_quantity: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(summary)
    }
}
