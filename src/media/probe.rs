use std::collections::HashSet;

use serde_json::Value;

use super::error::ProbeError;
use super::types::{CodecKind, EncodingOption, ProbeResult};

/// Parses yt-dlp `--dump-json` output. Pure so the field mapping and
/// deduplication are testable without a subprocess.
pub(crate) fn parse_probe_json(raw: &str, url: &str) -> Result<ProbeResult, ProbeError> {
    let json: Value = serde_json::from_str(raw)
        .map_err(|e| ProbeError::Unknown(format!("unreadable yt-dlp metadata: {e}")))?;

    let title = json["title"]
        .as_str()
        .or_else(|| json["id"].as_str())
        .unwrap_or(url)
        .to_string();
    let uploader = json["uploader"]
        .as_str()
        .or_else(|| json["channel"].as_str())
        .map(|s| s.to_string());
    let duration = json["duration"].as_f64().map(|d| d as u64);
    let thumbnail = json["thumbnail"].as_str().map(|s| s.to_string());

    let mut encodings = Vec::new();
    let mut seen = HashSet::new();
    if let Some(formats) = json["formats"].as_array() {
        for format in formats {
            let option = encoding_from_json(format);
            let key = (
                option.height,
                option.audio_bitrate,
                option.container.clone(),
            );
            if seen.insert(key) {
                encodings.push(option);
            }
        }
    }

    Ok(ProbeResult {
        title,
        uploader,
        duration,
        thumbnail,
        encodings,
    })
}

fn encoding_from_json(format: &Value) -> EncodingOption {
    let vcodec = format["vcodec"].as_str();
    let acodec = format["acodec"].as_str();
    let codec = if vcodec.is_some_and(|c| c != "none") {
        CodecKind::Video
    } else if acodec.is_some_and(|c| c != "none") {
        CodecKind::Audio
    } else {
        CodecKind::None
    };

    EncodingOption {
        format_id: format["format_id"].as_str().unwrap_or_default().to_string(),
        height: format["height"].as_u64().map(|h| h as u32),
        audio_bitrate: format["abr"].as_f64().map(|b| b.round() as u32),
        container: format["ext"].as_str().unwrap_or_default().to_string(),
        size: format["filesize"]
            .as_u64()
            .or_else(|| format["filesize_approx"].as_u64()),
        codec,
        note: format["format_note"]
            .as_str()
            .or_else(|| format["format"].as_str())
            .map(|s| s.to_string()),
    }
}

/// Which backend should handle a probed URL.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Media(ProbeResult),
    Gallery,
}

/// Routes a probe outcome. Image-only content and the probe errors that
/// signal it go to the gallery backend; an unknown probe error is returned
/// for the orchestrator to surface as a per-item failure.
pub fn classify(probe: Result<ProbeResult, ProbeError>) -> Result<Route, ProbeError> {
    match probe {
        Ok(result) if result.has_playable_encoding() => Ok(Route::Media(result)),
        Ok(_) => Ok(Route::Gallery),
        Err(ProbeError::NoMedia) | Err(ProbeError::Unsupported) => Ok(Route::Gallery),
        Err(err) => Err(err),
    }
}
