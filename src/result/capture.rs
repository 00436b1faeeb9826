// src/result/capture.rs

//! Output capture for a single execution window.

/// Built-in channels, in reporting order: `(name, description)`.
const STANDARD_CHANNELS: [(&str, &str); 2] = [
    ("stdout", "Standard Output"),
    ("stderr", "Standard Error"),
];

/// Output captured on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    /// Short channel name (`"stdout"`).
    pub name: String,
    /// Human-readable description (`"Standard Output"`).
    pub description: String,
    pub output: String,
}

#[derive(Debug)]
struct Channel {
    name: String,
    description: String,
    buf: String,
}

/// Capture buffers for one execution window.
#[derive(Debug)]
pub struct CaptureSet {
    channels: Vec<Channel>,
}

impl CaptureSet {
    pub fn new() -> Self {
        let channels = STANDARD_CHANNELS
            .iter()
            .map(|(name, description)| Channel {
                name: (*name).to_string(),
                description: (*description).to_string(),
                buf: String::new(),
            })
            .collect();
        Self { channels }
    }

    /// Append to `channel`, creating it if unknown.
    pub fn write(&mut self, channel: &str, text: &str) {
        if let Some(existing) = self.channels.iter_mut().find(|c| c.name == channel) {
            existing.buf.push_str(text);
            return;
        }
        self.channels.push(Channel {
            name: channel.to_string(),
            description: channel.to_string(),
            buf: text.to_string(),
        });
    }

    /// Take all non-empty channel contents, leaving the buffers empty.
    pub fn retrieve(&mut self) -> Vec<Captured> {
        self.channels
            .iter_mut()
            .filter(|c| !c.buf.is_empty())
            .map(|c| Captured {
                name: c.name.clone(),
                description: c.description.clone(),
                output: std::mem::take(&mut c.buf),
            })
            .collect()
    }
}

impl Default for CaptureSet {
    fn default() -> Self {
        Self::new()
    }
}
