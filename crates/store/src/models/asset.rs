use crate::error::{Error, ErrorKind, Result};
use crate::record::{Index, Record, RecordId, Stored};
use exn::ResultExt;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// What kind of thing an asset record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetType {
    /// A file uploaded by a client and written to project storage.
    File,
}
impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
        }
    }
}
impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl FromStr for AssetType {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            _ => exn::bail!(ErrorKind::InvalidData("asset type")),
        }
    }
}

/// Metadata about one stored file.
///
/// `(project, name)` is unique: the name is the generated file identifier,
/// which is also the last component of the file's storage path.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub project: RecordId,
    pub asset_type: AssetType,
    pub name: String,
    pub size: Option<u64>,
    pub config: Option<Map<String, Value>>,
    pub pushed_at: OffsetDateTime,
}
impl Asset {
    /// Build the record for a file that was just written to disk.
    pub fn file(project: RecordId, name: impl Into<String>, size: u64) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidData("asset name"));
        }
        Ok(Self {
            project,
            asset_type: AssetType::File,
            name,
            size: Some(size),
            config: None,
            pushed_at: OffsetDateTime::now_utc(),
        })
    }

    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = Some(config);
        self
    }
}
impl Record for Asset {
    type Key = (RecordId, String);
    const COLLECTION: &'static str = "assets";

    fn key(&self) -> Self::Key {
        (self.project, self.name.clone())
    }

    fn indexes() -> &'static [Index] {
        &[Index {
            name: "asset_project_id_name_index_1",
            fields: &["asset_project_id", "asset_name"],
            unique: true,
        }]
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct AssetRow {
    pub(crate) id: i64,
    pub(crate) asset_project_id: i64,
    pub(crate) asset_type: String,
    pub(crate) asset_name: String,
    pub(crate) asset_size: Option<i64>,
    pub(crate) asset_config: Option<String>,
    pub(crate) asset_pushed_at: i64,
}
impl TryFrom<&Asset> for AssetRow {
    type Error = Error;
    fn try_from(asset: &Asset) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: 0,
            asset_project_id: asset.project.0,
            asset_type: asset.asset_type.to_string(),
            asset_name: asset.name.clone(),
            asset_size: asset
                .size
                .map(i64::try_from)
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("asset size"))?,
            asset_config: asset
                .config
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("asset config"))?,
            asset_pushed_at: asset.pushed_at.unix_timestamp(),
        })
    }
}
impl TryFrom<AssetRow> for Stored<Asset> {
    type Error = Error;
    fn try_from(row: AssetRow) -> std::result::Result<Self, Self::Error> {
        let asset = Asset {
            project: RecordId(row.asset_project_id),
            asset_type: row.asset_type.parse()?,
            name: row.asset_name,
            size: row
                .asset_size
                .map(u64::try_from)
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("asset size"))?,
            config: row
                .asset_config
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("asset config"))?,
            pushed_at: OffsetDateTime::from_unix_timestamp(row.asset_pushed_at)
                .or_raise(|| ErrorKind::InvalidData("asset timestamp"))?,
        };
        Ok(Stored::new(RecordId(row.id), asset))
    }
}
