pub mod visualization;

use serde::Serialize;

use crate::{AssetId, CaptureMetadata, TierCounts, session::{SessionSnapshot, SessionState}};

#[derive(Debug, Serialize)]
pub struct ForensicsReport {
    pub asset: Option<AssetId>,
    pub mime_type: Option<String>,
    pub state: SessionState,
    pub dimensions: Option<(u32, u32)>,
    pub risk: Option<RiskReportSection>,
    pub metadata: Option<MetadataReportSection>,
    pub heatmap: Option<HeatmapReportSection>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RiskReportSection {
    pub score: u8,
    pub high_risk: bool,
    pub final_score: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MetadataReportSection {
    pub found: bool,
    pub camera: Option<String>,
    pub software: Option<String>,
    pub captured_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HeatmapReportSection {
    pub width: u32,
    pub height: u32,
    pub quality: f32,
    pub max_delta: f64,
    pub tiers: TierCounts,
}

impl From<&CaptureMetadata> for MetadataReportSection {
    fn from(metadata: &CaptureMetadata) -> Self {
        Self {
            found: metadata.found,
            camera: metadata.camera_label(),
            software: metadata.software.clone(),
            captured_at: metadata.captured_at.clone(),
        }
    }
}

impl From<&SessionSnapshot> for ForensicsReport {
    fn from(snapshot: &SessionSnapshot) -> Self {
        Self {
            asset: snapshot.asset,
            mime_type: snapshot.mime_type.clone(),
            state: snapshot.state,
            dimensions: snapshot.dimensions,
            risk: snapshot.assessment.as_ref().map(|a| RiskReportSection {
                score: a.score(),
                high_risk: a.is_high_risk(),
                final_score: a.is_final(),
                reasons: a.reasons().to_vec(),
            }),
            metadata: snapshot.metadata.as_ref().map(MetadataReportSection::from),
            heatmap: snapshot.heatmap.as_ref().map(|h| HeatmapReportSection {
                width: h.width(),
                height: h.height(),
                quality: h.quality,
                max_delta: h.max_delta,
                tiers: h.tier_counts(),
            }),
            error: snapshot.last_error.clone(),
        }
    }
}

impl ForensicsReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
