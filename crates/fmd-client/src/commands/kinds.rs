use std::fmt;

use crate::location::LocationSource;

/// Longest lock-screen message passed through to the device
pub const MAX_LOCK_MESSAGE_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Camera {
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingerMode {
    Normal,
    Vibrate,
    Silent,
}

/// Non-destructive device commands.
///
/// Wiping is deliberately absent; it only exists behind
/// [`super::CommandGateway::execute_wipe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Locate(LocationSource),
    Ring,
    Lock { message: Option<String> },
    Camera(Camera),
    Bluetooth(bool),
    DoNotDisturb(bool),
    RingerMode(RingerMode),
}

impl CommandKind {
    /// Wire form understood by the device.
    pub fn to_command_string(&self) -> String {
        match self {
            Self::Locate(source) => source.command().to_string(),
            Self::Ring => "ring".into(),
            Self::Lock { message } => match message.as_deref().map(sanitize_lock_message) {
                Some(msg) if !msg.is_empty() => format!("lock {msg}"),
                _ => "lock".into(),
            },
            Self::Camera(Camera::Front) => "camera front".into(),
            Self::Camera(Camera::Back) => "camera back".into(),
            Self::Bluetooth(on) => format!("bluetooth {}", on_off(*on)),
            Self::DoNotDisturb(on) => format!("nodisturb {}", on_off(*on)),
            Self::RingerMode(mode) => format!(
                "ringermode {}",
                match mode {
                    RingerMode::Normal => "normal",
                    RingerMode::Vibrate => "vibrate",
                    RingerMode::Silent => "silent",
                }
            ),
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Locate(_) => "locate",
            Self::Ring => "ring",
            Self::Lock { .. } => "lock",
            Self::Camera(_) => "camera",
            Self::Bluetooth(_) => "bluetooth",
            Self::DoNotDisturb(_) => "nodisturb",
            Self::RingerMode(_) => "ringermode",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_command_string())
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

/// Strip characters the device's command parser or shell could misread.
///
/// Removes quotes, backticks, `;`, `$`, `\` and control characters, collapses
/// whitespace runs, and truncates to [`MAX_LOCK_MESSAGE_LEN`] characters.
pub fn sanitize_lock_message(message: &str) -> String {
    let filtered: String = message
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '`' | ';' | '$' | '\\'))
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    filtered
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_LOCK_MESSAGE_LEN)
        .collect::<String>()
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_strings() {
        let cases = [
            (CommandKind::Locate(LocationSource::Gps), "locate gps"),
            (CommandKind::Ring, "ring"),
            (CommandKind::Lock { message: None }, "lock"),
            (CommandKind::Camera(Camera::Front), "camera front"),
            (CommandKind::Camera(Camera::Back), "camera back"),
            (CommandKind::Bluetooth(true), "bluetooth on"),
            (CommandKind::DoNotDisturb(false), "nodisturb off"),
            (CommandKind::RingerMode(RingerMode::Vibrate), "ringermode vibrate"),
        ];
        for (kind, expected) in cases {
            assert_eq!(kind.to_command_string(), expected);
        }
    }

    #[test]
    fn test_lock_message_is_sanitized() {
        let kind = CommandKind::Lock {
            message: Some("  Call \"me\"; $HOME `now`\n\tplease  ".into()),
        };
        assert_eq!(kind.to_command_string(), "lock Call me HOME now please");
    }

    #[test]
    fn test_lock_message_that_sanitizes_to_nothing() {
        let kind = CommandKind::Lock {
            message: Some(";;$\"'".into()),
        };
        assert_eq!(kind.to_command_string(), "lock");
    }

    #[test]
    fn test_lock_message_truncation() {
        let long = "a".repeat(600);
        assert_eq!(sanitize_lock_message(&long).len(), MAX_LOCK_MESSAGE_LEN);
        let unicode = "ü".repeat(600);
        assert_eq!(sanitize_lock_message(&unicode).chars().count(), MAX_LOCK_MESSAGE_LEN);
    }
}
