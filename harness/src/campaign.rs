//! The intervention campaign document (`campaign.json`).

use serde_json::{Map, Value};

use emodkit_kernel::proof::canon::document_json_bytes;
use emodkit_kernel::{KernelError, Result};

const NAME_KEY: &str = "Campaign_Name";
const EVENTS_KEY: &str = "Events";
const USE_DEFAULTS_KEY: &str = "Use_Defaults";

/// Config key pointing at the campaign file.
pub const CAMPAIGN_FILENAME_KEY: &str = "Campaign_Filename";
/// Config key switching interventions on.
pub const ENABLE_INTERVENTIONS_KEY: &str = "Enable_Interventions";

/// An owned campaign: name, ordered events, defaults flag, extra top-level keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Campaign {
    name: String,
    events: Vec<Value>,
    use_defaults: bool,
    extra: Map<String, Value>,
}

impl Campaign {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Vec::new(),
            use_defaults: true,
            extra: Map::new(),
        }
    }

    /// Append an event.
    ///
    /// # Errors
    ///
    /// [`KernelError::Validation`] unless `event` is a JSON object.
    pub fn add_event(&mut self, event: Value) -> Result<()> {
        if !event.is_object() {
            return Err(KernelError::validation(format!(
                "campaign event must be an object, got {event}"
            )));
        }
        self.events.push(event);
        Ok(())
    }

    pub fn set_use_defaults(&mut self, use_defaults: bool) {
        self.use_defaults = use_defaults;
    }

    /// Set an extra top-level key.
    ///
    /// # Errors
    ///
    /// [`KernelError::Validation`] for the reserved keys.
    pub fn set_extra(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        if matches!(key, NAME_KEY | EVENTS_KEY | USE_DEFAULTS_KEY) || key.is_empty() {
            return Err(KernelError::validation(format!(
                "{key:?} cannot be set as an extra campaign key"
            )));
        }
        self.extra.insert(key.to_string(), value.into());
        Ok(())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn events(&self) -> &[Value] {
        &self.events
    }

    #[must_use]
    pub fn use_defaults(&self) -> bool {
        self.use_defaults
    }

    #[must_use]
    pub fn to_document(&self) -> Value {
        let mut root = self.extra.clone();
        root.insert(NAME_KEY.into(), Value::from(self.name.as_str()));
        root.insert(EVENTS_KEY.into(), Value::Array(self.events.clone()));
        root.insert(USE_DEFAULTS_KEY.into(), Value::from(u8::from(self.use_defaults)));
        Value::Object(root)
    }

    /// # Errors
    ///
    /// [`KernelError::Json`] if serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        document_json_bytes(&self.to_document())
    }

    /// Parse an existing campaign document.
    ///
    /// # Errors
    ///
    /// [`KernelError::Json`] for unparsable bytes; [`KernelError::Validation`]
    /// when the root is not an object, `Events` is not a list of objects, or
    /// `Use_Defaults` is not 0/1.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let Value::Object(mut root) = serde_json::from_slice(bytes)? else {
            return Err(KernelError::validation("campaign root must be an object"));
        };
        let name = match root.remove(NAME_KEY) {
            Some(Value::String(s)) => s,
            None => String::new(),
            Some(other) => {
                return Err(KernelError::validation(format!(
                    "{NAME_KEY} must be a string, got {other}"
                )))
            }
        };
        let use_defaults = match root.remove(USE_DEFAULTS_KEY).and_then(|v| v.as_u64()) {
            None | Some(1) => true,
            Some(0) => false,
            Some(n) => {
                return Err(KernelError::validation(format!(
                    "{USE_DEFAULTS_KEY} must be 0 or 1, got {n}"
                )))
            }
        };
        let mut campaign = Self::new(name);
        campaign.use_defaults = use_defaults;
        match root.remove(EVENTS_KEY) {
            Some(Value::Array(events)) => {
                for event in events {
                    campaign.add_event(event)?;
                }
            }
            None => {}
            Some(_) => return Err(KernelError::validation(format!("{EVENTS_KEY} must be a list"))),
        }
        campaign.extra = root;
        Ok(campaign)
    }
}
