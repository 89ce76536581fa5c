use std::path::Path;

use visual_forensics::{
    ForensicsSession, error::Result, report::{ForensicsReport, visualization::screen_blend},
};

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "evidences/spliced.jpg".into());
    let bytes = std::fs::read(&path)?;

    let mime_type = match Path::new(&path).extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    };

    let session = ForensicsSession::new();
    session.upload(bytes, mime_type).await?;

    if let Some(assessment) = session.assessment() {
        println!("Manipulation probability: {}%", assessment.score());
        for reason in assessment.reasons() {
            println!("  • {}", reason);
        }
    }

    if let Some(camera) = session.metadata().and_then(|m| m.camera_label()) {
        println!("Captured on {}", camera);
    }

    let heatmap = session.run_deep_scan().await?;
    std::fs::create_dir_all("output")?;
    heatmap.save("output/ela_heatmap.png")?;

    if let Some(original) = session.decoded_pixels() {
        screen_blend(&original, &heatmap)?.save("output/ela_overlay.png")?;
    }

    let tiers = heatmap.tier_counts();
    println!();
    println!("  Max delta: {:.2}", heatmap.max_delta);
    println!("  Tiers: low {} / mid {} / high {}", tiers.low, tiers.mid, tiers.high);
    println!("  Output: output/ela_heatmap.png, output/ela_overlay.png");
    println!();

    if let Ok(json) = ForensicsReport::from(&session.snapshot()).to_json() {
        println!("{}", json);
    }

    Ok(())
}
