//! Greeting and load request sent when a socket opens.

use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use tokio::time::Instant;

use super::endpoint::encode_component;
use crate::{
    config::SessionConfig,
    session::{DocumentTarget, PROTOCOL_VERSION},
};

/// Wall clock anchored to a monotonic origin.
///
/// Epoch time is derived from elapsed monotonic time, so it advances with
/// Tokio's clock (and therefore under `tokio::time::pause`).
#[derive(Clone, Copy, Debug)]
pub struct WallClock {
    origin: Instant,
    origin_epoch_ms: f64,
}

impl WallClock {
    /// Anchor the clock at the current instant.
    #[must_use]
    pub fn start() -> Self {
        let before = epoch_ms_now();
        let origin = Instant::now();
        let after = epoch_ms_now();
        Self {
            origin,
            origin_epoch_ms: f64::midpoint(before, after),
        }
    }

    /// Anchor the clock at a known epoch time.
    #[must_use]
    pub fn anchored(origin: Instant, origin_epoch_ms: f64) -> Self {
        Self {
            origin,
            origin_epoch_ms,
        }
    }

    /// Milliseconds since the anchor.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 { Instant::now().duration_since(self.origin).as_secs_f64() * 1000.0 }

    /// Current epoch time in milliseconds.
    #[must_use]
    pub fn epoch_ms(&self) -> f64 { self.origin_epoch_ms + self.elapsed_ms() }

    /// Current epoch time, truncated to whole milliseconds.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "epoch milliseconds are positive and far below u64::MAX"
    )]
    pub fn epoch_ms_u64(&self) -> u64 { self.epoch_ms().max(0.0) as u64 }
}

fn epoch_ms_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64() * 1000.0)
}

/// `coolclient` greeting with a synchronised timestamp sample.
///
/// ```
/// use docwire::connection::{WallClock, client_hello};
/// use tokio::time::Instant;
///
/// let clock = WallClock::anchored(Instant::now(), 1_700_000_000_000.0);
/// assert!(client_hello(&clock).starts_with("coolclient 0.1 1700000000000"));
/// ```
#[must_use]
pub fn client_hello(clock: &WallClock) -> String {
    let before = clock.epoch_ms();
    let elapsed = clock.elapsed_ms();
    let after = clock.epoch_ms();
    format!(
        "coolclient {PROTOCOL_VERSION} {} {}",
        f64::midpoint(before, after),
        elapsed
    )
}

/// The `load` command for the current document.
#[derive(Debug)]
pub struct LoadRequest<'a> {
    config: &'a SessionConfig,
    document: &'a DocumentTarget,
    part: Option<u32>,
}

impl<'a> LoadRequest<'a> {
    /// Build a load request.
    #[must_use]
    pub fn new(config: &'a SessionConfig, document: &'a DocumentTarget) -> Self {
        Self {
            config,
            document,
            part: None,
        }
    }

    /// Reopen on `part` after a reconnect.
    #[must_use]
    pub fn with_part(mut self, part: Option<u32>) -> Self {
        self.part = part;
        self
    }
}

impl fmt::Display for LoadRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cfg = self.config;
        write!(f, "load url={}", encode_component(&self.document.url))?;
        if let Some(part) = self.part {
            write!(f, " part={part}")?;
        }
        if let Some(timestamp) = &cfg.document.timestamp {
            write!(f, " timestamp={timestamp}")?;
        }
        if let Some(password) = &self.document.password {
            write!(f, " password={password}")?;
        }
        write!(f, " lang={}", cfg.locale)?;
        if let Some(factor) = &cfg.device_form_factor {
            write!(f, " deviceFormFactor={factor}")?;
        }
        write!(f, " timezone={}", cfg.timezone.as_deref().unwrap_or("UTC"))?;
        if let Some(rendering) = &cfg.rendering_options {
            write!(f, " options={}", serde_json::json!({ "rendering": rendering }))?;
        }
        if let Some(spell) = cfg.spell_online {
            write!(f, " spellOnline={spell}")?;
        }
        write!(
            f,
            " darkTheme={} darkBackground={} accessibilityState={} clientvisiblearea={}",
            cfg.dark_theme.unwrap_or(false),
            cfg.dark_background.unwrap_or(false),
            cfg.accessibility.unwrap_or(false),
            cfg.visible_area
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::VisibleArea, session::Session};

    #[test]
    fn minimal_load_request() {
        let cfg = SessionConfig::new("wss://office.example", "https://wopi.example/f/1");
        let session = Session::new(&cfg);
        let load = LoadRequest::new(&cfg, session.document()).to_string();
        assert_eq!(
            load,
            "load url=https%3A%2F%2Fwopi.example%2Ff%2F1 lang=en-US timezone=UTC \
             darkTheme=false darkBackground=false accessibilityState=false \
             clientvisiblearea=0;0;0;0"
        );
    }

    #[test]
    fn full_load_request_keeps_token_order() {
        let mut cfg = SessionConfig::new("wss://office.example", "doc").with_locale("de-DE");
        cfg.document.password = Some("s3cret".to_owned());
        cfg.document.timestamp = Some("1234".to_owned());
        cfg.device_form_factor = Some("desktop".to_owned());
        cfg.timezone = Some("Europe/Berlin".to_owned());
        cfg.rendering_options = Some(serde_json::json!({".uno:HideWhitespace": "true"}));
        cfg.spell_online = Some(true);
        cfg.dark_theme = Some(true);
        cfg.visible_area = VisibleArea {
            x: 0,
            y: 0,
            width: 100,
            height: 50,
        };
        let session = Session::new(&cfg);
        let load = LoadRequest::new(&cfg, session.document())
            .with_part(Some(2))
            .to_string();
        assert_eq!(
            load,
            "load url=doc part=2 timestamp=1234 password=s3cret lang=de-DE \
             deviceFormFactor=desktop timezone=Europe/Berlin \
             options={\"rendering\":{\".uno:HideWhitespace\":\"true\"}} spellOnline=true \
             darkTheme=true darkBackground=false accessibilityState=false \
             clientvisiblearea=0;0;100;50"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn wall_clock_follows_paused_time() {
        let clock = WallClock::anchored(Instant::now(), 1000.0);
        tokio::time::advance(std::time::Duration::from_millis(250)).await;
        assert_eq!(clock.epoch_ms_u64(), 1250);
    }
}
