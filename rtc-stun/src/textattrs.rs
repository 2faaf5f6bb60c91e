use shared::error::*;
use std::fmt;

use crate::attributes::*;
use crate::message::*;

const MAX_SOFTWARE_B: usize = 763;

/// Software is SOFTWARE attribute.
///
/// RFC 5389 Section 15.10
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Software(pub String);

impl fmt::Display for Software {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Software {
    pub fn new(text: &str) -> Self {
        Software(text.to_owned())
    }
}

impl Setter for Software {
    /// add_to adds SOFTWARE to m, truncating it to the maximum allowed size.
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let mut end = self.0.len().min(MAX_SOFTWARE_B);
        while !self.0.is_char_boundary(end) {
            end -= 1;
        }
        m.add(ATTR_SOFTWARE, &self.0.as_bytes()[..end]);
        Ok(())
    }
}

impl Getter for Software {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(ATTR_SOFTWARE)?;
        self.0 = String::from_utf8_lossy(&v).into_owned();
        Ok(())
    }
}
