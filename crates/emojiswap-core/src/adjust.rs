//! # Adjustment State
//!
//! Holds the slider values the user is editing and forwards them to the
//! session. Rapid changes are coalesced: a change is only sent once no newer
//! change arrived for the debounce window, so a slider drag produces one
//! `process` call instead of dozens.

use crate::session::{ProcessingSession, SessionStatus};
use crate::styles::StyleCatalog;
use crate::{CoreError, Result};
use emojiswap_client::types::MAX_LEVEL;
use emojiswap_client::EmojiConfig;
use parking_lot::Mutex;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Default quiet period before a change is sent
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// One editable field of [`EmojiConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    StyleId,
    BlendIntensity,
    ExpressionMatch,
    ColorAdjustment,
}

impl Parameter {
    pub const ALL: [Parameter; 4] = [
        Parameter::StyleId,
        Parameter::BlendIntensity,
        Parameter::ExpressionMatch,
        Parameter::ColorAdjustment,
    ];

    /// Field name in the `emoji_config` JSON
    pub fn wire_name(self) -> &'static str {
        match self {
            Parameter::StyleId => "styleId",
            Parameter::BlendIntensity => "blendIntensity",
            Parameter::ExpressionMatch => "expressionMatch",
            Parameter::ColorAdjustment => "colorAdjustment",
        }
    }

    pub fn get(self, config: &EmojiConfig) -> u32 {
        match self {
            Parameter::StyleId => config.style_id,
            Parameter::BlendIntensity => u32::from(config.blend_intensity),
            Parameter::ExpressionMatch => u32::from(config.expression_match),
            Parameter::ColorAdjustment => u32::from(config.color_adjustment),
        }
    }

    /// Write `value` into `config`. Sliders must be within `0..=100`.
    pub fn apply(self, config: &mut EmojiConfig, value: u32) -> Result<()> {
        let slider = match self {
            Parameter::StyleId => {
                config.style_id = value;
                return Ok(());
            }
            Parameter::BlendIntensity => &mut config.blend_intensity,
            Parameter::ExpressionMatch => &mut config.expression_match,
            Parameter::ColorAdjustment => &mut config.color_adjustment,
        };

        match u8::try_from(value) {
            Ok(level) if level <= MAX_LEVEL => {
                *slider = level;
                Ok(())
            }
            _ => Err(CoreError::InvalidParameter(format!(
                "{} must be between 0 and {}, got {}",
                self.wire_name(),
                MAX_LEVEL,
                value
            ))),
        }
    }
}

impl FromStr for Parameter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "styleId" | "style-id" | "style" => Ok(Parameter::StyleId),
            "blendIntensity" | "blend-intensity" | "blend" => Ok(Parameter::BlendIntensity),
            "expressionMatch" | "expression-match" | "expression" => {
                Ok(Parameter::ExpressionMatch)
            }
            "colorAdjustment" | "color-adjustment" | "color" => Ok(Parameter::ColorAdjustment),
            other => Err(CoreError::InvalidParameter(format!(
                "unknown parameter '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

enum Command {
    Change(EmojiConfig),
    Flush,
    Discard,
}

/// Slider state bound to one session.
///
/// Must be created inside a Tokio runtime; the debounce worker runs as a
/// background task until the adjuster is dropped.
pub struct Adjuster {
    session: ProcessingSession,
    catalog: StyleCatalog,
    config: Mutex<EmojiConfig>,
    commands: mpsc::UnboundedSender<Command>,
    debounce: Duration,
}

impl Adjuster {
    pub fn new(session: ProcessingSession, debounce: Duration) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(debounce_loop(session.clone(), rx, debounce));

        let config = session.snapshot().config;
        Self {
            session,
            catalog: StyleCatalog::builtin(),
            config: Mutex::new(config),
            commands,
            debounce,
        }
    }

    pub fn with_catalog(mut self, catalog: StyleCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn config(&self) -> EmojiConfig {
        *self.config.lock()
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn catalog(&self) -> &StyleCatalog {
        &self.catalog
    }

    /// Change one field and schedule a reprocess.
    ///
    /// Invalid values are rejected and leave the config untouched. Setting a
    /// field to its current value schedules nothing.
    pub fn set_parameter(&self, parameter: Parameter, value: u32) -> Result<EmojiConfig> {
        let mut config = self.config.lock();
        let mut updated = *config;
        parameter.apply(&mut updated, value)?;
        if parameter == Parameter::StyleId {
            self.catalog.require(value)?;
        }

        if updated == *config {
            return Ok(updated);
        }

        trace!("{} = {}", parameter, value);
        *config = updated;
        self.send(Command::Change(updated));
        Ok(updated)
    }

    pub fn set_parameter_by_name(&self, name: &str, value: u32) -> Result<EmojiConfig> {
        self.set_parameter(name.parse()?, value)
    }

    pub fn select_style(&self, style_id: u32) -> Result<EmojiConfig> {
        self.set_parameter(Parameter::StyleId, style_id)
    }

    /// Send any pending change now instead of waiting out the window
    pub fn flush(&self) {
        self.send(Command::Flush);
    }

    /// Restore default slider values, keeping the style.
    ///
    /// Only reprocesses when the session shows a result made with other values.
    pub fn reset(&self) -> EmojiConfig {
        let mut config = self.config.lock();
        let defaults = config.with_default_levels();
        *config = defaults;

        let snapshot = self.session.snapshot();
        let stale_result = match snapshot.status {
            SessionStatus::Ready => snapshot
                .latest_artifact
                .as_ref()
                .is_some_and(|a| a.config != defaults),
            SessionStatus::Processing => true,
            _ => false,
        };

        if stale_result {
            self.send(Command::Change(defaults));
        } else {
            self.send(Command::Discard);
            self.session.update_config(defaults);
        }
        defaults
    }

    /// Pick up the session's config, e.g. after the session was reset
    pub fn sync(&self) -> EmojiConfig {
        let config = self.session.snapshot().config;
        *self.config.lock() = config;
        self.send(Command::Discard);
        config
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Debounce worker stopped, dropping adjustment");
        }
    }
}

/// The sequence number is taken here, in command order; only the service
/// call runs detached.
fn dispatch(session: &ProcessingSession, pending: Option<EmojiConfig>) {
    let Some(request) = pending.and_then(|config| session.queue_config(config)) else {
        return;
    };
    debug!("Sending adjusted config");
    let session = session.clone();
    tokio::spawn(async move {
        session.run_process(request).await;
    });
}

async fn debounce_loop(
    session: ProcessingSession,
    mut rx: mpsc::UnboundedReceiver<Command>,
    window: Duration,
) {
    let mut pending: Option<EmojiConfig> = None;
    loop {
        let command = match pending {
            None => rx.recv().await,
            Some(_) => match tokio::time::timeout(window, rx.recv()).await {
                Ok(command) => command,
                Err(_) => {
                    dispatch(&session, pending.take());
                    continue;
                }
            },
        };

        match command {
            Some(Command::Change(config)) => pending = Some(config),
            Some(Command::Flush) => dispatch(&session, pending.take()),
            Some(Command::Discard) => pending = None,
            None => {
                dispatch(&session, pending.take());
                return;
            }
        }
    }
}
