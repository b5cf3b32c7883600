//! Federation-wide names.
//!
//! A URN looks like `urn:publicid:IDN+plc:princeton+slice+myslice`; the
//! equivalent HRN is `plc.princeton.myslice` with type `slice`. Dots inside
//! the leaf are escaped in the HRN as `\.`.

use std::fmt;

use crate::error::RSpecError;

pub const URN_PREFIX: &str = "urn:publicid:IDN+";

/// Split an HRN at unescaped dots.
fn split_hrn(hrn: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in hrn.chars() {
        match c {
            '\\' if !escaped => {
                escaped = true;
                current.push(c);
            }
            '.' if !escaped => parts.push(std::mem::take(&mut current)),
            _ => {
                escaped = false;
                current.push(c);
            }
        }
    }
    parts.push(current);
    parts
}

fn unescape(segment: &str) -> String {
    segment.replace("\\.", ".")
}

fn escape(segment: &str) -> String {
    segment.replace('.', "\\.")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Xrn {
    hrn: String,
    type_name: String,
}

impl Xrn {
    pub fn from_hrn(hrn: impl Into<String>, type_name: impl Into<String>) -> Self {
        Xrn {
            hrn: hrn.into(),
            type_name: type_name.into(),
        }
    }

    pub fn from_urn(urn: &str) -> Result<Self, RSpecError> {
        let body = urn
            .strip_prefix(URN_PREFIX)
            .ok_or_else(|| RSpecError::invalid(format!("not a publicid urn: {urn}")))?;
        let mut parts = body.splitn(3, '+');
        let authority = parts.next().unwrap_or_default();
        let type_name = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();
        if authority.is_empty() || type_name.is_empty() {
            return Err(RSpecError::invalid(format!("malformed urn: {urn}")));
        }
        let authority_hrn = authority.replace(':', ".");
        if type_name == "authority" {
            return Ok(Xrn {
                hrn: authority_hrn,
                type_name: format!("authority+{name}"),
            });
        }
        if name.is_empty() {
            return Err(RSpecError::invalid(format!("urn has no name: {urn}")));
        }
        Ok(Xrn {
            hrn: format!("{authority_hrn}.{}", escape(name)),
            type_name: type_name.to_string(),
        })
    }

    /// Accept either form; an HRN takes `default_type`.
    pub fn parse(value: &str, default_type: &str) -> Result<Self, RSpecError> {
        if value.starts_with("urn:") {
            Self::from_urn(value)
        } else {
            Ok(Self::from_hrn(value, default_type))
        }
    }

    pub fn hrn(&self) -> &str {
        &self.hrn
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_type(&self, type_name: &str) -> bool {
        self.type_name == type_name
    }

    /// Last HRN segment, unescaped.
    pub fn leaf(&self) -> String {
        split_hrn(&self.hrn)
            .last()
            .map(|s| unescape(s))
            .unwrap_or_default()
    }

    pub fn authority_hrn(&self) -> String {
        let parts = split_hrn(&self.hrn);
        parts[..parts.len().saturating_sub(1)].join(".")
    }

    pub fn urn(&self) -> String {
        if let Some(role) = self.type_name.strip_prefix("authority+") {
            return format!("{URN_PREFIX}{}+authority+{role}", self.hrn.replace('.', ":"));
        }
        let authority = self.authority_hrn().replace('.', ":");
        format!("{URN_PREFIX}{authority}+{}+{}", self.type_name, self.leaf())
    }
}

impl fmt::Display for Xrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.hrn, self.type_name)
    }
}

pub fn hrn_to_urn(hrn: &str, type_name: &str) -> String {
    Xrn::from_hrn(hrn, type_name).urn()
}

pub fn urn_to_hrn(urn: &str) -> Result<String, RSpecError> {
    Ok(Xrn::from_urn(urn)?.hrn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_urn_maps_to_hrn() {
        let xrn = Xrn::from_urn("urn:publicid:IDN+plc:princeton+slice+myslice").unwrap();
        assert_eq!(xrn.hrn(), "plc.princeton.myslice");
        assert_eq!(xrn.type_name(), "slice");
        assert_eq!(xrn.leaf(), "myslice");
        assert_eq!(xrn.authority_hrn(), "plc.princeton");
        assert_eq!(xrn.urn(), "urn:publicid:IDN+plc:princeton+slice+myslice");
    }

    #[test]
    fn dotted_leaf_is_escaped() {
        let xrn = Xrn::from_urn("urn:publicid:IDN+plc:site+node+pl1.site.org").unwrap();
        assert_eq!(xrn.hrn(), "plc.site.pl1\\.site\\.org");
        assert_eq!(xrn.leaf(), "pl1.site.org");
        assert_eq!(xrn.authority_hrn(), "plc.site");
        assert_eq!(xrn.urn(), "urn:publicid:IDN+plc:site+node+pl1.site.org");
    }

    #[test]
    fn authority_urns_round_trip() {
        let xrn = Xrn::from_urn("urn:publicid:IDN+plc+authority+cm").unwrap();
        assert_eq!(xrn.hrn(), "plc");
        assert_eq!(xrn.urn(), "urn:publicid:IDN+plc+authority+cm");
    }

    #[test]
    fn sliver_urn_from_hrn() {
        assert_eq!(
            hrn_to_urn("plc.princeton.myslice-pl1", "sliver"),
            "urn:publicid:IDN+plc:princeton+sliver+myslice-pl1"
        );
        assert!(Xrn::from_urn("not-a-urn").is_err());
        assert_eq!(urn_to_hrn("urn:publicid:IDN+plc+user+alice").unwrap(), "plc.alice");
    }
}
