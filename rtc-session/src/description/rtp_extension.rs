/// A negotiated RTP header extension (`a=extmap`).
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RtpExtension {
    pub uri: String,
    pub id: u16,
    pub encrypt: bool,
}

impl RtpExtension {
    pub fn new(uri: &str, id: u16) -> Self {
        RtpExtension {
            uri: uri.to_owned(),
            id,
            encrypt: false,
        }
    }

    pub fn with_encrypt(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }
}

/// Drops repeated URIs. When a URI is listed both in the clear and
/// encrypted, the entry matching `prefer_encrypted` is kept.
pub fn deduplicate_header_extensions(
    extensions: &[RtpExtension],
    prefer_encrypted: bool,
) -> Vec<RtpExtension> {
    let mut result: Vec<RtpExtension> = vec![];
    for ext in extensions {
        match result.iter_mut().find(|e| e.uri == ext.uri) {
            Some(existing) => {
                if existing.encrypt != prefer_encrypted && ext.encrypt == prefer_encrypted {
                    *existing = ext.clone();
                }
            }
            None => result.push(ext.clone()),
        }
    }
    result
}
