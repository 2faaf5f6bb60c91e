/// ICE credentials and options of one transport, as signaled per content.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct TransportDescription {
    pub ice_ufrag: String,
    pub ice_pwd: String,
    pub transport_options: Vec<String>,
    pub ice_lite: bool,
}

impl TransportDescription {
    pub fn new(ice_ufrag: &str, ice_pwd: &str) -> Self {
        TransportDescription {
            ice_ufrag: ice_ufrag.to_owned(),
            ice_pwd: ice_pwd.to_owned(),
            ..Default::default()
        }
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.transport_options.iter().any(|o| o == option)
    }
}

/// Binds a [`TransportDescription`] to the content it belongs to.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct TransportInfo {
    pub content_name: String,
    pub description: TransportDescription,
}

impl TransportInfo {
    pub fn new(content_name: &str, description: TransportDescription) -> Self {
        TransportInfo {
            content_name: content_name.to_owned(),
            description,
        }
    }
}
