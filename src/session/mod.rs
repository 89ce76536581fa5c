pub mod controller;

use std::sync::Arc;

use serde::Serialize;

use crate::{AssetId, CaptureMetadata, ElaHeatmap, detection::RiskAssessment};

pub use controller::ForensicsSession;

/// Lifecycle of the current image: `Empty -> MetadataPending -> Assessed -> (ElaPending -> ElaReady)*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Empty,
    MetadataPending,
    Assessed,
    ElaPending,
    ElaReady,
}

impl SessionState {
    pub fn has_assessment(&self) -> bool {
        matches!(
            self,
            SessionState::Assessed | SessionState::ElaPending | SessionState::ElaReady
        )
    }
}

/// Notifications for the presentation layer. Every event names the asset it belongs to.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged {
        asset: Option<AssetId>,
        state: SessionState,
    },
    AssessmentUpdated {
        asset: AssetId,
        assessment: RiskAssessment,
    },
    HeatmapReady {
        asset: AssetId,
        max_delta: f64,
    },
    Failed {
        asset: Option<AssetId>,
        message: String,
    },
}

/// Enablement of the deep-scan controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Controls {
    pub can_run_deep_scan: bool,
    pub can_reveal_heatmap: bool,
    pub heatmap_visible: bool,
}

/// Consistent copy of everything the session exposes, taken under one lock.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub asset: Option<AssetId>,
    pub mime_type: Option<String>,
    pub state: SessionState,
    pub dimensions: Option<(u32, u32)>,
    pub metadata: Option<CaptureMetadata>,
    pub assessment: Option<RiskAssessment>,
    pub heatmap: Option<Arc<ElaHeatmap>>,
    pub heatmap_visible: bool,
    pub last_error: Option<String>,
}
