/// Options for the shell window and its embedded player page.
#[derive(Debug, Clone)]
pub struct ShellOptions {
    /// Window title. Default: "Music"
    pub title: String,
    /// Inner width in logical pixels. Default: 1024
    pub width: f64,
    /// Inner height in logical pixels. Default: 768
    pub height: f64,
    /// URL loaded on startup.
    pub start_url: String,
    /// Host the injection stage is gated on. Navigations that finish on a
    /// different host are revealed but never injected into.
    pub expected_host: String,
    /// Custom User-Agent sent with every request. The streaming service
    /// refuses the default WKWebView UA, so this is a fixed Safari string.
    pub user_agent: String,
    /// Compile and attach the service-worker block rule before the first
    /// navigation. Default: true
    pub block_service_worker: bool,
    /// Enable the Safari Web Inspector. Default: false
    pub devtools: bool,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            title: "Music".to_string(),
            width: 1024.0,
            height: 768.0,
            start_url: "https://music.youtube.com".to_string(),
            expected_host: "music.youtube.com".to_string(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_13_5) \
                         AppleWebKit/605.1.15 (KHTML, like Gecko) \
                         Version/11.1.1 Safari/605.1.15"
                .to_string(),
            block_service_worker: true,
            devtools: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_target_the_service_host() {
        let opts = ShellOptions::default();
        assert!(opts.start_url.contains(&opts.expected_host));
        assert!(opts.block_service_worker);
    }
}
