const RECORD_COLUMNS: &str = "id, owner_id, fields, assets, dirty, tombstoned, rev, updated_at";

/// Entity kinds that take part in sync. One table per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Profile,
    Setting,
    Memory,
    Story,
    GrowthPoint,
    Reminder,
}

impl RecordKind {
    /// Parents first: a memory references its profile.
    pub const PUSH_ORDER: [RecordKind; 6] = [
        RecordKind::Profile,
        RecordKind::Setting,
        RecordKind::Memory,
        RecordKind::Story,
        RecordKind::GrowthPoint,
        RecordKind::Reminder,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Profile => "profile",
            RecordKind::Setting => "setting",
            RecordKind::Memory => "memory",
            RecordKind::Story => "story",
            RecordKind::GrowthPoint => "growth_point",
            RecordKind::Reminder => "reminder",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::PUSH_ORDER
            .into_iter()
            .find(|kind| kind.as_str() == raw.trim())
    }

    fn table(self) -> &'static str {
        match self {
            RecordKind::Profile => "profiles",
            RecordKind::Setting => "settings",
            RecordKind::Memory => "memories",
            RecordKind::Story => "stories",
            RecordKind::GrowthPoint => "growth_points",
            RecordKind::Reminder => "reminders",
        }
    }

    /// Middle segment of `{owner}/{category}/{file}` object paths.
    pub fn asset_category(self) -> &'static str {
        match self {
            RecordKind::Profile => "avatars",
            RecordKind::Memory | RecordKind::GrowthPoint => "photos",
            RecordKind::Story => "illustrations",
            RecordKind::Setting | RecordKind::Reminder => "attachments",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the bytes of an asset live.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetLocator {
    /// File name inside the blob store.
    Local { file: String },
    /// Absolute URL into the object store.
    Remote { url: String },
}

impl AssetLocator {
    pub fn local(file: impl Into<String>) -> Self {
        AssetLocator::Local { file: file.into() }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        AssetLocator::Remote { url: url.into() }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, AssetLocator::Local { .. })
    }

    pub fn local_file(&self) -> Option<&str> {
        match self {
            AssetLocator::Local { file } => Some(file.as_str()),
            AssetLocator::Remote { .. } => None,
        }
    }

    pub fn remote_url(&self) -> Option<&str> {
        match self {
            AssetLocator::Remote { url } => Some(url.as_str()),
            AssetLocator::Local { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub kind: RecordKind,
    pub id: String,
    pub owner_id: Option<String>,
    pub fields: serde_json::Value,
    pub assets: Vec<AssetLocator>,
    pub dirty: bool,
    pub tombstoned: bool,
    pub rev: i64,
    pub updated_at_ms: i64,
}

impl Record {
    pub fn has_local_assets(&self) -> bool {
        self.assets.iter().any(AssetLocator::is_local)
    }

    /// The entity that owns this record's objects in remote storage.
    pub fn storage_owner_id(&self) -> &str {
        self.owner_id.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Input for `upsert_local`. A missing id creates a new record.
#[derive(Clone, Debug)]
pub struct RecordDraft {
    pub kind: RecordKind,
    pub id: Option<String>,
    pub owner_id: Option<String>,
    pub fields: serde_json::Value,
    pub assets: Vec<AssetLocator>,
}

impl RecordDraft {
    pub fn new(kind: RecordKind, fields: serde_json::Value) -> Self {
        Self {
            kind,
            id: None,
            owner_id: None,
            fields,
            assets: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_asset(mut self, asset: AssetLocator) -> Self {
        self.assets.push(asset);
        self
    }
}

struct RawRecordRow {
    id: String,
    owner_id: Option<String>,
    fields: String,
    assets: String,
    dirty: i64,
    tombstoned: i64,
    rev: i64,
    updated_at_ms: i64,
}

impl RawRecordRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            fields: row.get(2)?,
            assets: row.get(3)?,
            dirty: row.get(4)?,
            tombstoned: row.get(5)?,
            rev: row.get(6)?,
            updated_at_ms: row.get(7)?,
        })
    }

    fn into_record(self, kind: RecordKind) -> Result<Record> {
        let fields: serde_json::Value = serde_json::from_str(&self.fields)
            .map_err(|e| anyhow!("corrupt fields for {kind} {}: {e}", self.id))?;
        let assets: Vec<AssetLocator> = serde_json::from_str(&self.assets)
            .map_err(|e| anyhow!("corrupt assets for {kind} {}: {e}", self.id))?;
        Ok(Record {
            kind,
            id: self.id,
            owner_id: self.owner_id,
            fields,
            assets,
            dirty: self.dirty != 0,
            tombstoned: self.tombstoned != 0,
            rev: self.rev,
            updated_at_ms: self.updated_at_ms,
        })
    }
}

fn query_records(
    conn: &Connection,
    kind: RecordKind,
    where_clause: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Record>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM {} WHERE {where_clause} ORDER BY updated_at ASC, id ASC",
        kind.table()
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(args)?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(RawRecordRow::from_row(row)?.into_record(kind)?);
    }
    Ok(out)
}

fn encode_assets(assets: &[AssetLocator]) -> Result<String> {
    Ok(serde_json::to_string(assets)?)
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(i64::MAX)
}
