use image::ImageFormat;

use crate::{
    CaptureMetadata,
    detection::{RiskAssessment, RiskRule},
    image_utils::is_near_square,
};

/// Lowercase fragments of known editor names matched against the software tag.
pub const EDITOR_SIGNATURES: &[&str] = &["photoshop", "gimp"];

/// Canonical output sizes of common image generators.
pub const GENERATIVE_RESOLUTIONS: &[(u32, u32)] = &[(1024, 1024), (512, 512)];

#[derive(Debug, Clone, Copy, Default)]
pub struct RiskScorer;

impl RiskScorer {
    pub fn new() -> Self {
        Self
    }

    /// Pure and deterministic. With `dimensions == None` the geometry rules are deferred
    /// and the result is a partial assessment; scoring again with dimensions only appends.
    pub fn score(
        &self,
        metadata: &CaptureMetadata,
        format: Option<ImageFormat>,
        dimensions: Option<(u32, u32)>,
    ) -> RiskAssessment {
        let mut assessment = RiskAssessment::new();

        if metadata.found {
            match self.editor_trace(metadata) {
                Some(software) => assessment.add(
                    RiskRule::EditingSoftware,
                    format!("Edit software trace detected: {}", software),
                ),
                None => assessment.add(RiskRule::CameraSignature, "Camera signature verified."),
            }
        } else {
            assessment.add(
                RiskRule::MissingMetadata,
                "No camera metadata found (common in web files/AI).",
            );
        }

        if format == Some(ImageFormat::Png) {
            assessment.add(RiskRule::LosslessFormat, "PNG format (less likely for raw photos).");
        }

        if let Some((width, height)) = dimensions {
            if !metadata.found && is_near_square(width, height) {
                assessment.add(RiskRule::SquareAspect, "Perfect square aspect ratio (AI typical).");
            }

            if !metadata.found && GENERATIVE_RESOLUTIONS.contains(&(width, height)) {
                assessment.add(
                    RiskRule::GenerativeResolution,
                    format!("Standard generative AI resolution ({}x{}).", width, height),
                );
            }

            assessment.mark_dimensions_resolved();
        }

        assessment
    }

    fn editor_trace<'a>(&self, metadata: &'a CaptureMetadata) -> Option<&'a str> {
        let software = metadata.software.as_deref()?;
        let lowered = software.to_lowercase();

        EDITOR_SIGNATURES
            .iter()
            .any(|editor| lowered.contains(editor))
            .then_some(software)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(software: Option<&str>) -> CaptureMetadata {
        CaptureMetadata {
            found: true,
            make: Some("Canon".into()),
            model: Some("EOS R5".into()),
            software: software.map(Into::into),
            captured_at: Some("2024:05:01 10:00:00".into()),
        }
    }

    #[test]
    fn test_photoshop_partial_then_final() {
        let scorer = RiskScorer::new();
        let metadata = CaptureMetadata {
            found: true,
            software: Some("Adobe Photoshop 25.0".into()),
            ..Default::default()
        };

        let partial = scorer.score(&metadata, Some(ImageFormat::Jpeg), None);
        assert_eq!(partial.score(), 30);
        assert_eq!(partial.reasons(), ["Edit software trace detected: Adobe Photoshop 25.0".to_string()]);
        assert!(!partial.is_final());

        let final_ = scorer.score(&metadata, Some(ImageFormat::Jpeg), Some((1024, 1024)));
        assert_eq!(final_.score(), 30);
        assert_eq!(final_.reasons(), partial.reasons());
        assert!(final_.is_final());
    }

    #[test]
    fn test_bare_png_at_generative_size_clamps_to_100() {
        let scorer = RiskScorer::new();
        let assessment = scorer.score(&CaptureMetadata::absent(), Some(ImageFormat::Png), Some((512, 512)));

        assert_eq!(assessment.raw_total(), 100);
        assert_eq!(assessment.score(), 100);
        assert_eq!(
            assessment.rules(),
            [
                RiskRule::MissingMetadata,
                RiskRule::LosslessFormat,
                RiskRule::SquareAspect,
                RiskRule::GenerativeResolution,
            ]
        );
        assert_eq!(
            assessment.reasons(),
            [
                "No camera metadata found (common in web files/AI).".to_string(),
                "PNG format (less likely for raw photos).".to_string(),
                "Perfect square aspect ratio (AI typical).".to_string(),
                "Standard generative AI resolution (512x512).".to_string(),
            ]
        );
    }

    #[test]
    fn test_bare_landscape_jpeg_only_missing_metadata() {
        let assessment = RiskScorer::new().score(
            &CaptureMetadata::absent(),
            Some(ImageFormat::Jpeg),
            Some((1920, 1080)),
        );

        assert_eq!(assessment.score(), 40);
        assert_eq!(assessment.rules(), [RiskRule::MissingMetadata]);
    }

    #[test]
    fn test_camera_signature_adds_context_only() {
        let assessment = RiskScorer::new().score(&camera(Some("Firmware 1.2")), Some(ImageFormat::Jpeg), Some((800, 800)));

        assert_eq!(assessment.score(), 0);
        assert_eq!(assessment.reasons(), ["Camera signature verified.".to_string()]);
    }

    #[test]
    fn test_editor_match_is_case_insensitive() {
        let assessment = RiskScorer::new().score(&camera(Some("GIMP 2.10")), None, None);
        assert_eq!(assessment.rules(), [RiskRule::EditingSoftware]);

        let assessment = RiskScorer::new().score(&camera(Some("adobe PHOTOSHOP lightroom")), None, None);
        assert_eq!(assessment.rules(), [RiskRule::EditingSoftware]);
    }

    #[test]
    fn test_square_without_generative_size() {
        let assessment = RiskScorer::new().score(&CaptureMetadata::absent(), None, Some((1000, 980)));

        assert_eq!(assessment.score(), 70);
        assert_eq!(assessment.rules(), [RiskRule::MissingMetadata, RiskRule::SquareAspect]);
    }

    #[test]
    fn test_refresh_is_monotonic() {
        let scorer = RiskScorer::new();
        let inputs = [
            (CaptureMetadata::absent(), Some(ImageFormat::Png), (512, 512)),
            (CaptureMetadata::absent(), Some(ImageFormat::Jpeg), (1024, 1024)),
            (CaptureMetadata::absent(), None, (300, 200)),
            (camera(None), Some(ImageFormat::Png), (1024, 1024)),
            (camera(Some("GIMP")), Some(ImageFormat::Jpeg), (640, 480)),
        ];

        for (metadata, format, dimensions) in inputs {
            let partial = scorer.score(&metadata, format, None);
            let final_ = scorer.score(&metadata, format, Some(dimensions));

            assert!(final_.score() >= partial.score());
            assert!(final_.score() <= 100);
            assert_eq!(&final_.reasons()[..partial.reasons().len()], partial.reasons());
            assert!(final_.rules().iter().skip(partial.rules().len()).all(RiskRule::needs_dimensions));
        }
    }
}
