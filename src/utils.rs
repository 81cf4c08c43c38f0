use indicatif::ProgressStyle;
use reqwest::Url;

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
        .expect("invalid progress template")
}

pub fn pb_style_speed() -> ProgressStyle {
    ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {per_sec} ETA {eta} {msg}",
    )
    .expect("invalid progress template")
}

/// 判断字符串是否是带有 scheme 和 host 的 http(s) 地址
pub fn is_url(s: &str) -> bool {
    match Url::parse(s) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.has_host(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/a.jpg"));
        assert!(is_url("http://127.0.0.1:8080/a.png"));
        assert!(!is_url("images/a.jpg"));
        assert!(!is_url("/tmp/a.jpg"));
        assert!(!is_url("file:///tmp/a.jpg"));
        assert!(!is_url(""));
    }
}
