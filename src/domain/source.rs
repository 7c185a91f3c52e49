use serde::{Deserialize, Serialize};

/// The upstream provider a piece of data originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Google,
    Yelp,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Google => "google",
            Source::Yelp => "yelp",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = super::error::IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Source::Google),
            "yelp" => Ok(Source::Yelp),
            other => Err(super::error::IngestError::validation(format!(
                "unknown source: {other}"
            ))),
        }
    }
}

/// The kind of collection job a worker executes against a given source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CollectionJobKind {
    /// A nearby/area search seeded by a geographic cell.
    SearchNearby {
        source: Source,
        lat: f64,
        lng: f64,
        radius_meters: u32,
    },
    /// Fetch full details for a single externally-identified place.
    PlaceDetails { source: Source, external_id: String },
}

impl CollectionJobKind {
    pub fn source(&self) -> Source {
        match self {
            CollectionJobKind::SearchNearby { source, .. } => *source,
            CollectionJobKind::PlaceDetails { source, .. } => *source,
        }
    }
}
