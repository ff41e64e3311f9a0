use url::Url;

/// Sites both backends are known to handle. Anything else still gets handed
/// to yt-dlp, but the front-end warns first.
pub const SUPPORTED_DOMAINS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "facebook.com",
    "instagram.com",
    "tiktok.com",
    "twitter.com",
    "x.com",
    "reddit.com",
    "pinterest.com",
    "twitch.tv",
    "soundcloud.com",
    "vimeo.com",
    "bilibili.com",
    "mixcloud.com",
    "rumble.com",
    "odnoklassniki.ru",
    "ted.com",
];

/// Rewrites wrapper links into the real resource URL.
///
/// Reddit's media viewer wraps the actual image URL in a percent-encoded
/// `url=` query parameter; everything else passes through trimmed. Never
/// fails: any parse problem falls back to the trimmed input.
pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.contains("reddit.com/media") && trimmed.contains("url=") {
        if let Ok(parsed) = Url::parse(trimmed) {
            if let Some((_, value)) = parsed.query_pairs().find(|(key, _)| key == "url") {
                if !value.is_empty() {
                    return value.into_owned();
                }
            }
        }
    }
    trimmed.to_string()
}

pub fn is_supported_domain(url: &str) -> bool {
    let lower = url.to_lowercase();
    SUPPORTED_DOMAINS.iter().any(|domain| lower.contains(domain))
}

/// Human-readable byte count. Zero or missing sizes render as "N/A".
pub fn friendly_size(bytes: Option<u64>) -> String {
    let Some(n) = bytes.filter(|n| *n > 0) else {
        return "N/A".to_string();
    };
    let mut n = n as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if n < 1024.0 {
            return format!("{n:3.1}{unit}");
        }
        n /= 1024.0;
    }
    format!("{n:.1}PB")
}

/// Renders seconds as `h:mm:ss` with unpadded hours.
pub fn seconds_to_hhmmss(secs: u64) -> String {
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Parses `h:mm:ss`, `mm:ss`, or bare seconds back into a second count.
/// A field must stay below 60 whenever a larger unit precedes it.
pub fn parse_hhmmss(text: &str) -> Option<u64> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let mut total = 0u64;
    for (i, part) in parts.iter().rev().enumerate() {
        let value: u64 = part.parse().ok()?;
        if i + 1 < parts.len() && value >= 60 {
            return None;
        }
        total += value * 60u64.pow(i as u32);
    }
    Some(total)
}
