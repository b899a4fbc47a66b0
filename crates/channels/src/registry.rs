use {super::adapter::ChannelAdapter, std::collections::HashMap};

/// Registry of all loaded channel adapters, keyed by platform identifier.
pub struct ChannelRegistry {
    adapters: HashMap<String, Box<dyn ChannelAdapter>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn register(&mut self, adapter: Box<dyn ChannelAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn ChannelAdapter> {
        self.adapters.get(name).map(|a| a.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Box<dyn ChannelAdapter>> {
        self.adapters.get_mut(name)
    }

    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        self.adapters.keys().map(|s| s.as_str()).collect()
    }
}
